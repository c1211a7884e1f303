//! Loading renderer configuration from disk.

use std::io::Write;

use nether_render::device::{DeviceCommand, RecordingDevice};
use nether_render::{ConfigError, Renderer, RendererConfig, ShadowType, ToneMapping};

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_config_file() {
    let file = write_config(
        r#"
        alpha = true
        antialias = true

        [render]
        width = 320
        height = 240
        pixel_ratio = 2.0
        tone_mapping = "ACESFilmic"

        [shadows]
        enabled = true
        shadow_type = "PCFSoft"
        "#,
    );
    let config = RendererConfig::load(file.path()).unwrap();
    assert!(config.alpha);
    assert!(config.antialias);
    assert_eq!((config.render.width, config.render.height), (320, 240));
    assert_eq!(config.render.tone_mapping, ToneMapping::AcesFilmic);
    assert!(config.shadows.enabled);
    assert_eq!(config.shadows.shadow_type, ShadowType::PcfSoft);

    let renderer = Renderer::new(RecordingDevice::new(), config).unwrap();
    assert_eq!(renderer.drawing_buffer_size(), (640, 480));
    // Alpha surfaces start fully transparent
    assert_eq!(renderer.clear_color().1, 0.0);
}

#[test]
fn test_saved_config_loads_back() {
    let mut config = RendererConfig::default();
    config.render.auto_clear_stencil = false;
    config.shadows.shadow_type = ShadowType::Vsm;
    let file = write_config(&config.to_toml_string().unwrap());
    assert_eq!(RendererConfig::load(file.path()).unwrap(), config);
}

#[test]
fn test_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("renderer.toml");
    match RendererConfig::load(&path) {
        Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected an io error, got {other:?}"),
    }
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let file = write_config("[render\nwidth = 3");
    assert!(matches!(
        RendererConfig::load(file.path()),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_surface_size_drives_the_viewport() {
    let file = write_config("[render]\nwidth = 100\nheight = 50\n");
    let config = RendererConfig::load(file.path()).unwrap();
    let mut renderer = Renderer::new(RecordingDevice::new(), config).unwrap();
    let mut scene = nether_render::Scene::new();
    let camera = nether_render::Camera::perspective(60.0, 2.0, 0.1, 10.0);
    renderer.render(&mut scene, &camera).unwrap();

    let viewport = renderer
        .device()
        .commands()
        .iter()
        .rev()
        .find_map(|c| match c {
            DeviceCommand::Viewport(rect) => Some(*rect),
            _ => None,
        })
        .unwrap();
    assert_eq!((viewport.width, viewport.height), (100, 50));
}
