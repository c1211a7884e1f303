//! Frame statistics

use crate::device::DrawMode;

/// Counters for the last frame plus live resource totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderInfo {
    /// Frames rendered since creation
    pub frame: u64,
    pub calls: u64,
    pub triangles: u64,
    pub lines: u64,
    pub points: u64,
    /// Live programs
    pub programs: usize,
    /// Geometries with GPU buffers
    pub geometries: usize,
    /// Uploaded textures
    pub textures: usize,
}

impl RenderInfo {
    /// Zero the per-frame counters; totals and the frame number are kept.
    pub fn reset(&mut self) {
        self.calls = 0;
        self.triangles = 0;
        self.lines = 0;
        self.points = 0;
    }

    pub(crate) fn record_draw(&mut self, mode: DrawMode, count: u32, instances: u32) {
        let count = u64::from(count);
        let instances = u64::from(instances);
        self.calls += 1;
        match mode {
            DrawMode::Triangles => self.triangles += instances * (count / 3),
            DrawMode::TriangleStrip => self.triangles += instances * count.saturating_sub(2),
            DrawMode::Lines => self.lines += instances * (count / 2),
            DrawMode::LineStrip => self.lines += instances * count.saturating_sub(1),
            DrawMode::LineLoop => self.lines += instances * count,
            DrawMode::Points => self.points += instances * count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_counts() {
        let mut info = RenderInfo::default();
        info.record_draw(DrawMode::Triangles, 36, 2);
        info.record_draw(DrawMode::Lines, 10, 1);
        info.record_draw(DrawMode::LineStrip, 4, 1);
        info.record_draw(DrawMode::Points, 7, 3);
        assert_eq!(info.calls, 4);
        assert_eq!(info.triangles, 24);
        assert_eq!(info.lines, 8);
        assert_eq!(info.points, 21);

        info.reset();
        assert_eq!(info.calls, 0);
        assert_eq!(info.triangles, 0);
    }
}
