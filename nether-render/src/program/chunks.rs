//! GLSL chunk library and per-shader templates
//!
//! Templates pull chunks in with `#include <name>`; [`super::source`]
//! resolves includes, substitutes light and clipping counts, then unrolls
//! `#pragma unroll_loop_start` blocks.
//!
//! Conventions the uniform reflector relies on: one declaration per line,
//! array sizes written without spaces (`name[NUM_X]`), and every sized array
//! guarded by a `> 0` check on its count.

use super::parameters::ShaderId;

/// Chunk text by include name.
pub fn chunk(name: &str) -> Option<&'static str> {
    Some(match name {
        "common" => COMMON,
        "packing" => PACKING,
        "uv_pars_vertex" => UV_PARS_VERTEX,
        "uv_vertex" => UV_VERTEX,
        "uv_pars_fragment" => UV_PARS_FRAGMENT,
        "color_pars_vertex" => COLOR_PARS_VERTEX,
        "color_vertex" => COLOR_VERTEX,
        "color_pars_fragment" => COLOR_PARS_FRAGMENT,
        "color_fragment" => COLOR_FRAGMENT,
        "morphtarget_pars_vertex" => MORPHTARGET_PARS_VERTEX,
        "morphnormal_vertex" => MORPHNORMAL_VERTEX,
        "morphtarget_vertex" => MORPHTARGET_VERTEX,
        "skinning_pars_vertex" => SKINNING_PARS_VERTEX,
        "skinbase_vertex" => SKINBASE_VERTEX,
        "skinnormal_vertex" => SKINNORMAL_VERTEX,
        "skinning_vertex" => SKINNING_VERTEX,
        "beginnormal_vertex" => BEGINNORMAL_VERTEX,
        "defaultnormal_vertex" => DEFAULTNORMAL_VERTEX,
        "normal_pars_vertex" => NORMAL_PARS_VERTEX,
        "normal_vertex" => NORMAL_VERTEX,
        "normal_pars_fragment" => NORMAL_PARS_FRAGMENT,
        "begin_vertex" => BEGIN_VERTEX,
        "displacementmap_pars_vertex" => DISPLACEMENTMAP_PARS_VERTEX,
        "displacementmap_vertex" => DISPLACEMENTMAP_VERTEX,
        "project_vertex" => PROJECT_VERTEX,
        "worldpos_vertex" => WORLDPOS_VERTEX,
        "logdepthbuf_pars_vertex" => LOGDEPTHBUF_PARS_VERTEX,
        "logdepthbuf_vertex" => LOGDEPTHBUF_VERTEX,
        "logdepthbuf_pars_fragment" => LOGDEPTHBUF_PARS_FRAGMENT,
        "logdepthbuf_fragment" => LOGDEPTHBUF_FRAGMENT,
        "clipping_planes_pars_vertex" => CLIPPING_PLANES_PARS_VERTEX,
        "clipping_planes_vertex" => CLIPPING_PLANES_VERTEX,
        "clipping_planes_pars_fragment" => CLIPPING_PLANES_PARS_FRAGMENT,
        "clipping_planes_fragment" => CLIPPING_PLANES_FRAGMENT,
        "fog_pars_vertex" => FOG_PARS_VERTEX,
        "fog_vertex" => FOG_VERTEX,
        "fog_pars_fragment" => FOG_PARS_FRAGMENT,
        "fog_fragment" => FOG_FRAGMENT,
        "map_pars_fragment" => MAP_PARS_FRAGMENT,
        "map_fragment" => MAP_FRAGMENT,
        "alphamap_pars_fragment" => ALPHAMAP_PARS_FRAGMENT,
        "alphamap_fragment" => ALPHAMAP_FRAGMENT,
        "alphatest_pars_fragment" => ALPHATEST_PARS_FRAGMENT,
        "alphatest_fragment" => ALPHATEST_FRAGMENT,
        "aomap_pars_fragment" => AOMAP_PARS_FRAGMENT,
        "aomap_fragment" => AOMAP_FRAGMENT,
        "lightmap_pars_fragment" => LIGHTMAP_PARS_FRAGMENT,
        "lightmap_fragment" => LIGHTMAP_FRAGMENT,
        "emissivemap_pars_fragment" => EMISSIVEMAP_PARS_FRAGMENT,
        "emissivemap_fragment" => EMISSIVEMAP_FRAGMENT,
        "normalmap_pars_fragment" => NORMALMAP_PARS_FRAGMENT,
        "bumpmap_pars_fragment" => BUMPMAP_PARS_FRAGMENT,
        "normal_fragment_begin" => NORMAL_FRAGMENT_BEGIN,
        "normal_fragment_maps" => NORMAL_FRAGMENT_MAPS,
        "specularmap_pars_fragment" => SPECULARMAP_PARS_FRAGMENT,
        "specularmap_fragment" => SPECULARMAP_FRAGMENT,
        "roughnessmap_pars_fragment" => ROUGHNESSMAP_PARS_FRAGMENT,
        "roughnessmap_fragment" => ROUGHNESSMAP_FRAGMENT,
        "metalnessmap_pars_fragment" => METALNESSMAP_PARS_FRAGMENT,
        "metalnessmap_fragment" => METALNESSMAP_FRAGMENT,
        "envmap_pars_fragment" => ENVMAP_PARS_FRAGMENT,
        "envmap_fragment" => ENVMAP_FRAGMENT,
        "bsdfs" => BSDFS,
        "lights_pars_begin" => LIGHTS_PARS_BEGIN,
        "lights_model_pars_fragment" => LIGHTS_MODEL_PARS_FRAGMENT,
        "lights_fragment_begin" => LIGHTS_FRAGMENT_BEGIN,
        "lights_fragment_end" => LIGHTS_FRAGMENT_END,
        "shadow_structs" => SHADOW_STRUCTS,
        "shadowmap_pars_vertex" => SHADOWMAP_PARS_VERTEX,
        "shadowmap_vertex" => SHADOWMAP_VERTEX,
        "shadowmap_pars_fragment" => SHADOWMAP_PARS_FRAGMENT,
        "shadowmask_pars_fragment" => SHADOWMASK_PARS_FRAGMENT,
        "transmission_pars_fragment" => TRANSMISSION_PARS_FRAGMENT,
        "transmission_fragment" => TRANSMISSION_FRAGMENT,
        "tonemapping_pars_fragment" => TONEMAPPING_PARS_FRAGMENT,
        "tonemapping_fragment" => TONEMAPPING_FRAGMENT,
        "colorspace_pars_fragment" => COLORSPACE_PARS_FRAGMENT,
        "colorspace_fragment" => COLORSPACE_FRAGMENT,
        "premultiplied_alpha_fragment" => PREMULTIPLIED_ALPHA_FRAGMENT,
        "dithering_pars_fragment" => DITHERING_PARS_FRAGMENT,
        "dithering_fragment" => DITHERING_FRAGMENT,
        _ => return None,
    })
}

/// `(vertex, fragment)` template for a built-in shader.
///
/// `Custom` has no template; its source comes from the material.
pub fn templates(shader: ShaderId) -> Option<(&'static str, &'static str)> {
    Some(match shader {
        ShaderId::Basic | ShaderId::Line => (BASIC_VERT, BASIC_FRAG),
        ShaderId::Lambert | ShaderId::Phong | ShaderId::Standard | ShaderId::Physical => {
            (LIT_VERT, LIT_FRAG)
        }
        ShaderId::Normal => (NORMAL_VERT, NORMAL_FRAG),
        ShaderId::Depth => (DEPTH_VERT, DEPTH_FRAG),
        ShaderId::Distance => (DISTANCE_VERT, DISTANCE_FRAG),
        ShaderId::Shadow => (SHADOW_VERT, SHADOW_FRAG),
        ShaderId::ShadowBlur => (BLUR_VERT, BLUR_FRAG),
        ShaderId::Points => (POINTS_VERT, POINTS_FRAG),
        ShaderId::Custom => return None,
    })
}

// =============================================================================
// Shared
// =============================================================================

const COMMON: &str = r#"
#define PI 3.141592653589793
#define RECIPROCAL_PI 0.3183098861837907
#define EPSILON 1e-6
#define saturate( a ) clamp( a, 0.0, 1.0 )
float pow2( const in float x ) { return x * x; }
float pow4( const in float x ) { float x2 = x * x; return x2 * x2; }
float max3( const in vec3 v ) { return max( max( v.x, v.y ), v.z ); }
float luminance( const in vec3 rgb ) { return dot( rgb, vec3( 0.2126, 0.7152, 0.0722 ) ); }
vec3 transformDirection( in vec3 dir, in mat4 matrix ) {
	return normalize( ( matrix * vec4( dir, 0.0 ) ).xyz );
}
vec3 inverseTransformDirection( in vec3 dir, in mat4 matrix ) {
	return normalize( ( vec4( dir, 0.0 ) * matrix ).xyz );
}
"#;

const PACKING: &str = r#"
const float PackUpscale = 256. / 255.;
const float UnpackDownscale = 255. / 256.;
const vec3 PackFactors = vec3( 256. * 256. * 256., 256. * 256., 256. );
const vec4 UnpackFactors = UnpackDownscale / vec4( PackFactors, 1. );
const float ShiftRight8 = 1. / 256.;
vec4 packDepthToRGBA( const in float v ) {
	vec4 r = vec4( fract( v * PackFactors ), v );
	r.yzw -= r.xyz * ShiftRight8;
	return r * PackUpscale;
}
float unpackRGBAToDepth( const in vec4 v ) {
	return dot( v, UnpackFactors );
}
float viewZToOrthographicDepth( const in float viewZ, const in float near, const in float far ) {
	return ( viewZ + near ) / ( near - far );
}
float perspectiveDepthToViewZ( const in float depth, const in float near, const in float far ) {
	return ( near * far ) / ( ( far - near ) * depth - far );
}
"#;

// =============================================================================
// Vertex stage
// =============================================================================

const UV_PARS_VERTEX: &str = r#"
#ifdef USE_UV
out vec2 vUv;
#endif
#ifdef USE_MAP
uniform mat3 mapTransform;
out vec2 vMapUv;
#endif
#ifdef USE_ALPHAMAP
uniform mat3 alphaMapTransform;
out vec2 vAlphaMapUv;
#endif
#ifdef USE_NORMALMAP
uniform mat3 normalMapTransform;
out vec2 vNormalMapUv;
#endif
"#;

const UV_VERTEX: &str = r#"
#ifdef USE_UV
	vUv = uv;
#endif
#ifdef USE_MAP
	vMapUv = ( mapTransform * vec3( uv, 1 ) ).xy;
#endif
#ifdef USE_ALPHAMAP
	vAlphaMapUv = ( alphaMapTransform * vec3( uv, 1 ) ).xy;
#endif
#ifdef USE_NORMALMAP
	vNormalMapUv = ( normalMapTransform * vec3( uv, 1 ) ).xy;
#endif
"#;

const COLOR_PARS_VERTEX: &str = r#"
#if defined( USE_COLOR ) || defined( USE_INSTANCING_COLOR )
out vec3 vColor;
#endif
"#;

const COLOR_VERTEX: &str = r#"
#if defined( USE_COLOR ) || defined( USE_INSTANCING_COLOR )
	vColor = vec3( 1.0 );
#endif
#ifdef USE_COLOR
	vColor *= color;
#endif
#ifdef USE_INSTANCING_COLOR
	vColor.xyz *= instanceColor.xyz;
#endif
"#;

const MORPHTARGET_PARS_VERTEX: &str = r#"
#ifdef USE_MORPHTARGETS
uniform float morphTargetBaseInfluence;
uniform float morphTargetInfluences[MORPHTARGETS_COUNT];
#endif
"#;

const MORPHNORMAL_VERTEX: &str = r#"
#ifdef USE_MORPHNORMALS
	objectNormal *= morphTargetBaseInfluence;
	#pragma unroll_loop_start
	for ( int i = 0; i < MORPHTARGETS_COUNT; i ++ ) {
		objectNormal += getMorphNormal( UNROLLED_LOOP_INDEX ) * morphTargetInfluences[ i ];
	}
	#pragma unroll_loop_end
#endif
"#;

const MORPHTARGET_VERTEX: &str = r#"
#ifdef USE_MORPHTARGETS
	transformed *= morphTargetBaseInfluence;
	#pragma unroll_loop_start
	for ( int i = 0; i < MORPHTARGETS_COUNT; i ++ ) {
		transformed += getMorphTarget( UNROLLED_LOOP_INDEX ) * morphTargetInfluences[ i ];
	}
	#pragma unroll_loop_end
#endif
"#;

const SKINNING_PARS_VERTEX: &str = r#"
#ifdef USE_SKINNING
uniform mat4 bindMatrix;
uniform mat4 bindMatrixInverse;
uniform mat4 boneMatrices[MAX_BONES];
mat4 getBoneMatrix( const in float i ) {
	return boneMatrices[ int( i ) ];
}
#endif
"#;

const SKINBASE_VERTEX: &str = r#"
#ifdef USE_SKINNING
	mat4 boneMatX = getBoneMatrix( skinIndex.x );
	mat4 boneMatY = getBoneMatrix( skinIndex.y );
	mat4 boneMatZ = getBoneMatrix( skinIndex.z );
	mat4 boneMatW = getBoneMatrix( skinIndex.w );
#endif
"#;

const SKINNORMAL_VERTEX: &str = r#"
#ifdef USE_SKINNING
	mat4 skinMatrix = mat4( 0.0 );
	skinMatrix += skinWeight.x * boneMatX;
	skinMatrix += skinWeight.y * boneMatY;
	skinMatrix += skinWeight.z * boneMatZ;
	skinMatrix += skinWeight.w * boneMatW;
	skinMatrix = bindMatrixInverse * skinMatrix * bindMatrix;
	objectNormal = vec4( skinMatrix * vec4( objectNormal, 0.0 ) ).xyz;
#endif
"#;

const SKINNING_VERTEX: &str = r#"
#ifdef USE_SKINNING
	vec4 skinVertex = bindMatrix * vec4( transformed, 1.0 );
	vec4 skinned = vec4( 0.0 );
	skinned += boneMatX * skinVertex * skinWeight.x;
	skinned += boneMatY * skinVertex * skinWeight.y;
	skinned += boneMatZ * skinVertex * skinWeight.z;
	skinned += boneMatW * skinVertex * skinWeight.w;
	transformed = ( bindMatrixInverse * skinned ).xyz;
#endif
"#;

const BEGINNORMAL_VERTEX: &str = r#"
	vec3 objectNormal = vec3( normal );
"#;

const DEFAULTNORMAL_VERTEX: &str = r#"
	vec3 transformedNormal = objectNormal;
#ifdef USE_INSTANCING
	mat3 im = mat3( instanceMatrix );
	transformedNormal /= vec3( dot( im[ 0 ], im[ 0 ] ), dot( im[ 1 ], im[ 1 ] ), dot( im[ 2 ], im[ 2 ] ) );
	transformedNormal = im * transformedNormal;
#endif
	transformedNormal = normalMatrix * transformedNormal;
#ifdef FLIP_SIDED
	transformedNormal = - transformedNormal;
#endif
"#;

const NORMAL_PARS_VERTEX: &str = r#"
#ifndef FLAT_SHADED
out vec3 vNormal;
#endif
"#;

const NORMAL_VERTEX: &str = r#"
#ifndef FLAT_SHADED
	vNormal = normalize( transformedNormal );
#endif
"#;

const BEGIN_VERTEX: &str = r#"
	vec3 transformed = vec3( position );
"#;

const DISPLACEMENTMAP_PARS_VERTEX: &str = r#"
#ifdef USE_DISPLACEMENTMAP
uniform sampler2D displacementMap;
uniform float displacementScale;
uniform float displacementBias;
#endif
"#;

const DISPLACEMENTMAP_VERTEX: &str = r#"
#ifdef USE_DISPLACEMENTMAP
	transformed += normalize( objectNormal ) * ( texture( displacementMap, vUv ).x * displacementScale + displacementBias );
#endif
"#;

const PROJECT_VERTEX: &str = r#"
	vec4 mvPosition = vec4( transformed, 1.0 );
#ifdef USE_INSTANCING
	mvPosition = instanceMatrix * mvPosition;
#endif
	mvPosition = modelViewMatrix * mvPosition;
	gl_Position = projectionMatrix * mvPosition;
"#;

const WORLDPOS_VERTEX: &str = r#"
#if defined( USE_ENVMAP ) || defined( DISTANCE ) || defined( USE_SHADOWMAP ) || defined( USE_TRANSMISSION ) || NUM_SPOT_LIGHT_COORDS > 0
	vec4 worldPosition = vec4( transformed, 1.0 );
	#ifdef USE_INSTANCING
	worldPosition = instanceMatrix * worldPosition;
	#endif
	worldPosition = modelMatrix * worldPosition;
#endif
"#;

const LOGDEPTHBUF_PARS_VERTEX: &str = r#"
#ifdef USE_LOGDEPTHBUF
out float vFragDepth;
out float vIsPerspective;
#endif
"#;

const LOGDEPTHBUF_VERTEX: &str = r#"
#ifdef USE_LOGDEPTHBUF
	vFragDepth = 1.0 + gl_Position.w;
	vIsPerspective = float( !isOrthographic );
#endif
"#;

const CLIPPING_PLANES_PARS_VERTEX: &str = r#"
#if NUM_CLIPPING_PLANES > 0
out vec3 vClipPosition;
#endif
"#;

const CLIPPING_PLANES_VERTEX: &str = r#"
#if NUM_CLIPPING_PLANES > 0
	vClipPosition = - mvPosition.xyz;
#endif
"#;

const FOG_PARS_VERTEX: &str = r#"
#ifdef USE_FOG
out float vFogDepth;
#endif
"#;

const FOG_VERTEX: &str = r#"
#ifdef USE_FOG
	vFogDepth = - mvPosition.z;
#endif
"#;

const SHADOW_STRUCTS: &str = r#"
struct DirectionalLightShadow {
	float shadowIntensity;
	float shadowBias;
	float shadowNormalBias;
	float shadowRadius;
	vec2 shadowMapSize;
};
struct SpotLightShadow {
	float shadowIntensity;
	float shadowBias;
	float shadowNormalBias;
	float shadowRadius;
	vec2 shadowMapSize;
};
struct PointLightShadow {
	float shadowIntensity;
	float shadowBias;
	float shadowNormalBias;
	float shadowRadius;
	vec2 shadowMapSize;
	float shadowCameraNear;
	float shadowCameraFar;
};
"#;

const SHADOWMAP_PARS_VERTEX: &str = r#"
#if NUM_SPOT_LIGHT_COORDS > 0
uniform mat4 spotLightMatrix[NUM_SPOT_LIGHT_COORDS];
out vec4 vSpotLightCoord[NUM_SPOT_LIGHT_COORDS];
#endif
#ifdef USE_SHADOWMAP
#include <shadow_structs>
#if NUM_DIR_LIGHT_SHADOWS > 0
uniform mat4 directionalShadowMatrix[NUM_DIR_LIGHT_SHADOWS];
out vec4 vDirectionalShadowCoord[NUM_DIR_LIGHT_SHADOWS];
uniform DirectionalLightShadow directionalLightShadows[NUM_DIR_LIGHT_SHADOWS];
#endif
#if NUM_POINT_LIGHT_SHADOWS > 0
uniform mat4 pointShadowMatrix[NUM_POINT_LIGHT_SHADOWS];
out vec4 vPointShadowCoord[NUM_POINT_LIGHT_SHADOWS];
uniform PointLightShadow pointLightShadows[NUM_POINT_LIGHT_SHADOWS];
#endif
#if NUM_SPOT_LIGHT_SHADOWS > 0
uniform SpotLightShadow spotLightShadows[NUM_SPOT_LIGHT_SHADOWS];
#endif
#endif
"#;

const SHADOWMAP_VERTEX: &str = r#"
#if ( defined( USE_SHADOWMAP ) && ( NUM_DIR_LIGHT_SHADOWS > 0 || NUM_POINT_LIGHT_SHADOWS > 0 ) ) || NUM_SPOT_LIGHT_COORDS > 0
	vec3 shadowWorldNormal = inverseTransformDirection( transformedNormal, viewMatrix );
	vec4 shadowWorldPosition;
#endif
#if defined( USE_SHADOWMAP )
	#if NUM_DIR_LIGHT_SHADOWS > 0
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_DIR_LIGHT_SHADOWS; i ++ ) {
		shadowWorldPosition = worldPosition + vec4( shadowWorldNormal * directionalLightShadows[ i ].shadowNormalBias, 0 );
		vDirectionalShadowCoord[ i ] = directionalShadowMatrix[ i ] * shadowWorldPosition;
	}
	#pragma unroll_loop_end
	#endif
	#if NUM_POINT_LIGHT_SHADOWS > 0
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_POINT_LIGHT_SHADOWS; i ++ ) {
		shadowWorldPosition = worldPosition + vec4( shadowWorldNormal * pointLightShadows[ i ].shadowNormalBias, 0 );
		vPointShadowCoord[ i ] = pointShadowMatrix[ i ] * shadowWorldPosition;
	}
	#pragma unroll_loop_end
	#endif
#endif
#if NUM_SPOT_LIGHT_COORDS > 0
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_SPOT_LIGHT_COORDS; i ++ ) {
		shadowWorldPosition = worldPosition;
		#if ( defined( USE_SHADOWMAP ) && UNROLLED_LOOP_INDEX < NUM_SPOT_LIGHT_SHADOWS )
		shadowWorldPosition.xyz += shadowWorldNormal * spotLightShadows[ i ].shadowNormalBias;
		#endif
		vSpotLightCoord[ i ] = spotLightMatrix[ i ] * shadowWorldPosition;
	}
	#pragma unroll_loop_end
#endif
"#;

// =============================================================================
// Fragment stage
// =============================================================================

const UV_PARS_FRAGMENT: &str = r#"
#ifdef USE_UV
in vec2 vUv;
#endif
#ifdef USE_MAP
in vec2 vMapUv;
#endif
#ifdef USE_ALPHAMAP
in vec2 vAlphaMapUv;
#endif
#ifdef USE_NORMALMAP
in vec2 vNormalMapUv;
#endif
"#;

const COLOR_PARS_FRAGMENT: &str = r#"
#if defined( USE_COLOR ) || defined( USE_INSTANCING_COLOR )
in vec3 vColor;
#endif
"#;

const COLOR_FRAGMENT: &str = r#"
#if defined( USE_COLOR ) || defined( USE_INSTANCING_COLOR )
	diffuseColor.rgb *= vColor;
#endif
"#;

const NORMAL_PARS_FRAGMENT: &str = r#"
#ifndef FLAT_SHADED
in vec3 vNormal;
#endif
"#;

const LOGDEPTHBUF_PARS_FRAGMENT: &str = r#"
#ifdef USE_LOGDEPTHBUF
uniform float logDepthBufFC;
in float vFragDepth;
in float vIsPerspective;
#endif
"#;

const LOGDEPTHBUF_FRAGMENT: &str = r#"
#ifdef USE_LOGDEPTHBUF
	gl_FragDepth = vIsPerspective == 0.0 ? gl_FragCoord.z : log2( vFragDepth ) * logDepthBufFC * 0.5;
#endif
"#;

const CLIPPING_PLANES_PARS_FRAGMENT: &str = r#"
#if NUM_CLIPPING_PLANES > 0
in vec3 vClipPosition;
uniform vec4 clippingPlanes[NUM_CLIPPING_PLANES];
#endif
"#;

const CLIPPING_PLANES_FRAGMENT: &str = r#"
#if NUM_CLIPPING_PLANES > 0
	vec4 plane;
	#pragma unroll_loop_start
	for ( int i = 0; i < UNION_CLIPPING_PLANES; i ++ ) {
		plane = clippingPlanes[ i ];
		if ( dot( vClipPosition, plane.xyz ) + plane.w < 0.0 ) discard;
	}
	#pragma unroll_loop_end
	#if UNION_CLIPPING_PLANES < NUM_CLIPPING_PLANES
	bool clipped = true;
	#pragma unroll_loop_start
	for ( int i = UNION_CLIPPING_PLANES; i < NUM_CLIPPING_PLANES; i ++ ) {
		plane = clippingPlanes[ i ];
		clipped = ( dot( vClipPosition, plane.xyz ) + plane.w < 0.0 ) && clipped;
	}
	#pragma unroll_loop_end
	if ( clipped ) discard;
	#endif
#endif
"#;

const FOG_PARS_FRAGMENT: &str = r#"
#ifdef USE_FOG
uniform vec3 fogColor;
in float vFogDepth;
#ifdef FOG_EXP2
uniform float fogDensity;
#else
uniform float fogNear;
uniform float fogFar;
#endif
#endif
"#;

const FOG_FRAGMENT: &str = r#"
#ifdef USE_FOG
	#ifdef FOG_EXP2
	float fogFactor = 1.0 - exp( - fogDensity * fogDensity * vFogDepth * vFogDepth );
	#else
	float fogFactor = smoothstep( fogNear, fogFar, vFogDepth );
	#endif
	gl_FragColor.rgb = mix( gl_FragColor.rgb, fogColor, fogFactor );
#endif
"#;

const MAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_MAP
uniform sampler2D map;
#endif
"#;

const MAP_FRAGMENT: &str = r#"
#ifdef USE_MAP
	diffuseColor *= texture( map, vMapUv );
#endif
"#;

const ALPHAMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_ALPHAMAP
uniform sampler2D alphaMap;
#endif
"#;

const ALPHAMAP_FRAGMENT: &str = r#"
#ifdef USE_ALPHAMAP
	diffuseColor.a *= texture( alphaMap, vAlphaMapUv ).g;
#endif
"#;

const ALPHATEST_PARS_FRAGMENT: &str = r#"
#ifdef USE_ALPHATEST
uniform float alphaTest;
#endif
"#;

const ALPHATEST_FRAGMENT: &str = r#"
#ifdef USE_ALPHATEST
	#ifdef ALPHA_TO_COVERAGE
	diffuseColor.a = smoothstep( alphaTest, alphaTest + fwidth( diffuseColor.a ), diffuseColor.a );
	if ( diffuseColor.a == 0.0 ) discard;
	#else
	if ( diffuseColor.a < alphaTest ) discard;
	#endif
#endif
"#;

const AOMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_AOMAP
uniform sampler2D aoMap;
uniform float aoMapIntensity;
#endif
"#;

const AOMAP_FRAGMENT: &str = r#"
#ifdef USE_AOMAP
	float ambientOcclusion = ( texture( aoMap, vUv ).r - 1.0 ) * aoMapIntensity + 1.0;
	reflectedLight.indirectDiffuse *= ambientOcclusion;
#endif
"#;

const LIGHTMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_LIGHTMAP
uniform sampler2D lightMap;
uniform float lightMapIntensity;
#endif
"#;

const LIGHTMAP_FRAGMENT: &str = r#"
#ifdef USE_LIGHTMAP
	reflectedLight.indirectDiffuse += texture( lightMap, vUv ).rgb * lightMapIntensity * diffuseColor.rgb;
#endif
"#;

const EMISSIVEMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_EMISSIVEMAP
uniform sampler2D emissiveMap;
#endif
"#;

const EMISSIVEMAP_FRAGMENT: &str = r#"
#ifdef USE_EMISSIVEMAP
	totalEmissiveRadiance *= texture( emissiveMap, vUv ).rgb;
#endif
"#;

const NORMALMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_NORMALMAP
uniform sampler2D normalMap;
uniform vec2 normalScale;
mat3 getTangentFrame( vec3 eyePos, vec3 surfNorm, vec2 uv ) {
	vec3 q0 = dFdx( eyePos.xyz );
	vec3 q1 = dFdy( eyePos.xyz );
	vec2 st0 = dFdx( uv.st );
	vec2 st1 = dFdy( uv.st );
	vec3 N = surfNorm;
	vec3 q1perp = cross( q1, N );
	vec3 q0perp = cross( N, q0 );
	vec3 T = q1perp * st0.x + q0perp * st1.x;
	vec3 B = q1perp * st0.y + q0perp * st1.y;
	float det = max( dot( T, T ), dot( B, B ) );
	float scale = ( det == 0.0 ) ? 0.0 : inversesqrt( det );
	return mat3( T * scale, B * scale, N );
}
#endif
"#;

const BUMPMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_BUMPMAP
uniform sampler2D bumpMap;
uniform float bumpScale;
vec3 perturbNormalArb( vec3 surfPos, vec3 surfNorm, float faceDirection ) {
	vec2 dSTdx = dFdx( vUv );
	vec2 dSTdy = dFdy( vUv );
	float Hll = bumpScale * texture( bumpMap, vUv ).x;
	float dBx = bumpScale * texture( bumpMap, vUv + dSTdx ).x - Hll;
	float dBy = bumpScale * texture( bumpMap, vUv + dSTdy ).x - Hll;
	vec3 vSigmaX = normalize( dFdx( surfPos.xyz ) );
	vec3 vSigmaY = normalize( dFdy( surfPos.xyz ) );
	vec3 vN = surfNorm;
	vec3 R1 = cross( vSigmaY, vN );
	vec3 R2 = cross( vN, vSigmaX );
	float fDet = dot( vSigmaX, R1 ) * faceDirection;
	vec3 vGrad = sign( fDet ) * ( dBx * R1 + dBy * R2 );
	return normalize( abs( fDet ) * surfNorm - vGrad );
}
#endif
"#;

const NORMAL_FRAGMENT_BEGIN: &str = r#"
	float faceDirection = gl_FrontFacing ? 1.0 : - 1.0;
#ifdef FLAT_SHADED
	vec3 normal = normalize( cross( dFdx( vViewPosition ), dFdy( vViewPosition ) ) );
#else
	vec3 normal = normalize( vNormal );
	#ifdef DOUBLE_SIDED
	normal *= faceDirection;
	#endif
#endif
	vec3 nonPerturbedNormal = normal;
"#;

const NORMAL_FRAGMENT_MAPS: &str = r#"
#ifdef USE_NORMALMAP
	vec3 mapN = texture( normalMap, vNormalMapUv ).xyz * 2.0 - 1.0;
	mapN.xy *= normalScale;
	normal = normalize( getTangentFrame( - vViewPosition, normal, vNormalMapUv ) * mapN );
#elif defined( USE_BUMPMAP )
	normal = perturbNormalArb( - vViewPosition, normal, faceDirection );
#endif
"#;

const SPECULARMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_SPECULARMAP
uniform sampler2D specularMap;
#endif
"#;

const SPECULARMAP_FRAGMENT: &str = r#"
	float specularStrength = 1.0;
#ifdef USE_SPECULARMAP
	specularStrength = texture( specularMap, vUv ).r;
#endif
"#;

const ROUGHNESSMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_ROUGHNESSMAP
uniform sampler2D roughnessMap;
#endif
"#;

const ROUGHNESSMAP_FRAGMENT: &str = r#"
	float roughnessFactor = roughness;
#ifdef USE_ROUGHNESSMAP
	roughnessFactor *= texture( roughnessMap, vUv ).g;
#endif
"#;

const METALNESSMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_METALNESSMAP
uniform sampler2D metalnessMap;
#endif
"#;

const METALNESSMAP_FRAGMENT: &str = r#"
	float metalnessFactor = metalness;
#ifdef USE_METALNESSMAP
	metalnessFactor *= texture( metalnessMap, vUv ).b;
#endif
"#;

const ENVMAP_PARS_FRAGMENT: &str = r#"
#ifdef USE_ENVMAP
uniform float envMapIntensity;
uniform float flipEnvMap;
#ifdef ENVMAP_TYPE_CUBE
uniform samplerCube envMap;
#else
uniform sampler2D envMap;
#endif
vec4 sampleEnvMap( vec3 direction ) {
	#ifdef ENVMAP_TYPE_CUBE
	return texture( envMap, vec3( flipEnvMap * direction.x, direction.yz ) );
	#else
	vec2 equirect = vec2( atan( direction.z, direction.x ) * ( 0.5 * RECIPROCAL_PI ) + 0.5, asin( clamp( direction.y, - 1.0, 1.0 ) ) * RECIPROCAL_PI + 0.5 );
	return texture( envMap, equirect );
	#endif
}
#endif
"#;

const ENVMAP_FRAGMENT: &str = r#"
#ifdef USE_ENVMAP
	vec3 cameraToFrag = isOrthographic ? normalize( vec3( - viewMatrix[ 0 ][ 2 ], - viewMatrix[ 1 ][ 2 ], - viewMatrix[ 2 ][ 2 ] ) ) : normalize( vWorldPosition - cameraPosition );
	vec3 reflectVec = reflect( cameraToFrag, normalize( vWorldNormal ) );
	outgoingLight = mix( outgoingLight, outgoingLight * sampleEnvMap( reflectVec ).rgb, envMapIntensity );
#endif
"#;

const BSDFS: &str = r#"
vec3 BRDF_Lambert( const in vec3 diffuseColor ) {
	return RECIPROCAL_PI * diffuseColor;
}
vec3 F_Schlick( const in vec3 f0, const in float f90, const in float dotVH ) {
	float fresnel = exp2( ( - 5.55473 * dotVH - 6.98316 ) * dotVH );
	return f0 * ( 1.0 - fresnel ) + ( f90 * fresnel );
}
float V_GGX_SmithCorrelated( const in float alpha, const in float dotNL, const in float dotNV ) {
	float a2 = pow2( alpha );
	float gv = dotNL * sqrt( a2 + ( 1.0 - a2 ) * pow2( dotNV ) );
	float gl = dotNV * sqrt( a2 + ( 1.0 - a2 ) * pow2( dotNL ) );
	return 0.5 / max( gv + gl, EPSILON );
}
float D_GGX( const in float alpha, const in float dotNH ) {
	float a2 = pow2( alpha );
	float denom = pow2( dotNH ) * ( a2 - 1.0 ) + 1.0;
	return RECIPROCAL_PI * a2 / pow2( denom );
}
vec3 BRDF_GGX( const in vec3 lightDir, const in vec3 viewDir, const in vec3 normal, const in vec3 f0, const in float f90, const in float roughness ) {
	float alpha = pow2( roughness );
	vec3 halfDir = normalize( lightDir + viewDir );
	float dotNL = saturate( dot( normal, lightDir ) );
	float dotNV = saturate( dot( normal, viewDir ) );
	float dotNH = saturate( dot( normal, halfDir ) );
	float dotVH = saturate( dot( viewDir, halfDir ) );
	vec3 F = F_Schlick( f0, f90, dotVH );
	float V = V_GGX_SmithCorrelated( alpha, dotNL, dotNV );
	float D = D_GGX( alpha, dotNH );
	return F * ( V * D );
}
vec3 BRDF_BlinnPhong( const in vec3 lightDir, const in vec3 viewDir, const in vec3 normal, const in vec3 specularColor, const in float shininess ) {
	vec3 halfDir = normalize( lightDir + viewDir );
	float dotNH = saturate( dot( normal, halfDir ) );
	float dotVH = saturate( dot( viewDir, halfDir ) );
	vec3 F = F_Schlick( specularColor, 1.0, dotVH );
	float D = RECIPROCAL_PI * ( shininess * 0.5 + 1.0 ) * pow( dotNH, shininess );
	return F * ( 0.25 * D );
}
"#;

const LIGHTS_PARS_BEGIN: &str = r#"
uniform vec3 ambientLightColor;
uniform vec3 lightProbe[9];
struct IncidentLight {
	vec3 color;
	vec3 direction;
	bool visible;
};
struct ReflectedLight {
	vec3 directDiffuse;
	vec3 directSpecular;
	vec3 indirectDiffuse;
	vec3 indirectSpecular;
};
vec3 shGetIrradianceAt( in vec3 normal, in vec3 shCoefficients[ 9 ] ) {
	float x = normal.x, y = normal.y, z = normal.z;
	vec3 result = shCoefficients[ 0 ] * 0.886227;
	result += shCoefficients[ 1 ] * 2.0 * 0.511664 * y;
	result += shCoefficients[ 2 ] * 2.0 * 0.511664 * z;
	result += shCoefficients[ 3 ] * 2.0 * 0.511664 * x;
	result += shCoefficients[ 4 ] * 2.0 * 0.429043 * x * y;
	result += shCoefficients[ 5 ] * 2.0 * 0.429043 * y * z;
	result += shCoefficients[ 6 ] * ( 0.743125 * z * z - 0.247708 );
	result += shCoefficients[ 7 ] * 2.0 * 0.429043 * x * z;
	result += shCoefficients[ 8 ] * 0.429043 * ( x * x - y * y );
	return result;
}
vec3 getLightProbeIrradiance( const in vec3 lightProbe[ 9 ], const in vec3 normal ) {
	vec3 worldNormal = inverseTransformDirection( normal, viewMatrix );
	return shGetIrradianceAt( worldNormal, lightProbe );
}
float getDistanceAttenuation( const in float lightDistance, const in float cutoffDistance, const in float decayExponent ) {
	float distanceFalloff = 1.0 / max( pow( lightDistance, decayExponent ), 0.01 );
	if ( cutoffDistance > 0.0 ) {
		distanceFalloff *= pow2( saturate( 1.0 - pow4( lightDistance / cutoffDistance ) ) );
	}
	return distanceFalloff;
}
float getSpotAttenuation( const in float coneCosine, const in float penumbraCosine, const in float angleCosine ) {
	return smoothstep( coneCosine, penumbraCosine, angleCosine );
}
#if NUM_DIR_LIGHTS > 0
struct DirectionalLight {
	vec3 direction;
	vec3 color;
};
uniform DirectionalLight directionalLights[NUM_DIR_LIGHTS];
void getDirectionalLightInfo( const in DirectionalLight directionalLight, out IncidentLight light ) {
	light.color = directionalLight.color;
	light.direction = directionalLight.direction;
	light.visible = true;
}
#endif
#if NUM_POINT_LIGHTS > 0
struct PointLight {
	vec3 position;
	vec3 color;
	float distance;
	float decay;
};
uniform PointLight pointLights[NUM_POINT_LIGHTS];
void getPointLightInfo( const in PointLight pointLight, const in vec3 geometryPosition, out IncidentLight light ) {
	vec3 lVector = pointLight.position - geometryPosition;
	light.direction = normalize( lVector );
	float lightDistance = length( lVector );
	light.color = pointLight.color * getDistanceAttenuation( lightDistance, pointLight.distance, pointLight.decay );
	light.visible = ( light.color != vec3( 0.0 ) );
}
#endif
#if NUM_SPOT_LIGHTS > 0
struct SpotLight {
	vec3 position;
	vec3 direction;
	vec3 color;
	float distance;
	float decay;
	float coneCos;
	float penumbraCos;
};
uniform SpotLight spotLights[NUM_SPOT_LIGHTS];
void getSpotLightInfo( const in SpotLight spotLight, const in vec3 geometryPosition, out IncidentLight light ) {
	vec3 lVector = spotLight.position - geometryPosition;
	light.direction = normalize( lVector );
	float angleCos = dot( light.direction, spotLight.direction );
	float spotAttenuation = getSpotAttenuation( spotLight.coneCos, spotLight.penumbraCos, angleCos );
	if ( spotAttenuation > 0.0 ) {
		float lightDistance = length( lVector );
		light.color = spotLight.color * spotAttenuation * getDistanceAttenuation( lightDistance, spotLight.distance, spotLight.decay );
		light.visible = ( light.color != vec3( 0.0 ) );
	} else {
		light.color = vec3( 0.0 );
		light.visible = false;
	}
}
#endif
#if NUM_RECT_AREA_LIGHTS > 0
struct RectAreaLight {
	vec3 color;
	vec3 position;
	vec3 halfWidth;
	vec3 halfHeight;
};
uniform RectAreaLight rectAreaLights[NUM_RECT_AREA_LIGHTS];
#endif
#if NUM_HEMI_LIGHTS > 0
struct HemisphereLight {
	vec3 direction;
	vec3 skyColor;
	vec3 groundColor;
};
uniform HemisphereLight hemisphereLights[NUM_HEMI_LIGHTS];
vec3 getHemisphereLightIrradiance( const in HemisphereLight hemiLight, const in vec3 normal ) {
	float dotNL = dot( normal, hemiLight.direction );
	float hemiDiffuseWeight = 0.5 * dotNL + 0.5;
	return mix( hemiLight.groundColor, hemiLight.skyColor, hemiDiffuseWeight );
}
#endif
"#;

/// Shading model chosen by the `LAMBERT` / `PHONG` / `STANDARD` defines.
const LIGHTS_MODEL_PARS_FRAGMENT: &str = r#"
struct SurfaceMaterial {
	vec3 diffuseColor;
	vec3 specularColor;
	float specularShininess;
	float specularStrength;
	float roughness;
	float specularF90;
};
void RE_Direct( const in IncidentLight directLight, const in vec3 geometryPosition, const in vec3 geometryNormal, const in vec3 geometryViewDir, const in SurfaceMaterial material, inout ReflectedLight reflectedLight ) {
	float dotNL = saturate( dot( geometryNormal, directLight.direction ) );
	vec3 irradiance = dotNL * directLight.color;
	reflectedLight.directDiffuse += irradiance * BRDF_Lambert( material.diffuseColor );
#if defined( PHONG )
	reflectedLight.directSpecular += irradiance * BRDF_BlinnPhong( directLight.direction, geometryViewDir, geometryNormal, material.specularColor, material.specularShininess ) * material.specularStrength;
#elif defined( STANDARD )
	reflectedLight.directSpecular += irradiance * BRDF_GGX( directLight.direction, geometryViewDir, geometryNormal, material.specularColor, material.specularF90, material.roughness );
#endif
}
void RE_IndirectDiffuse( const in vec3 irradiance, const in SurfaceMaterial material, inout ReflectedLight reflectedLight ) {
	reflectedLight.indirectDiffuse += irradiance * BRDF_Lambert( material.diffuseColor );
}
"#;

const LIGHTS_FRAGMENT_BEGIN: &str = r#"
	vec3 geometryPosition = - vViewPosition;
	vec3 geometryNormal = normal;
	vec3 geometryViewDir = isOrthographic ? vec3( 0, 0, 1 ) : normalize( vViewPosition );
	IncidentLight directLight;
#if NUM_POINT_LIGHTS > 0
	PointLight pointLight;
	#if defined( USE_SHADOWMAP ) && NUM_POINT_LIGHT_SHADOWS > 0
	PointLightShadow pointLightShadow;
	#endif
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_POINT_LIGHTS; i ++ ) {
		pointLight = pointLights[ i ];
		getPointLightInfo( pointLight, geometryPosition, directLight );
		#if defined( USE_SHADOWMAP ) && ( UNROLLED_LOOP_INDEX < NUM_POINT_LIGHT_SHADOWS ) && defined( RECEIVE_SHADOW )
		pointLightShadow = pointLightShadows[ i ];
		directLight.color *= ( directLight.visible ) ? getPointShadow( pointShadowMap[ i ], pointLightShadow.shadowMapSize, pointLightShadow.shadowIntensity, pointLightShadow.shadowBias, pointLightShadow.shadowRadius, vPointShadowCoord[ i ], pointLightShadow.shadowCameraNear, pointLightShadow.shadowCameraFar ) : 1.0;
		#endif
		RE_Direct( directLight, geometryPosition, geometryNormal, geometryViewDir, material, reflectedLight );
	}
	#pragma unroll_loop_end
#endif
#if NUM_SPOT_LIGHTS > 0
	SpotLight spotLight;
	vec4 spotColor;
	vec3 spotLightCoord;
	bool inSpotLightMap;
	#if defined( USE_SHADOWMAP ) && NUM_SPOT_LIGHT_SHADOWS > 0
	SpotLightShadow spotLightShadow;
	#endif
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_SPOT_LIGHTS; i ++ ) {
		spotLight = spotLights[ i ];
		getSpotLightInfo( spotLight, geometryPosition, directLight );
		#if ( UNROLLED_LOOP_INDEX < NUM_SPOT_LIGHT_SHADOWS_WITH_MAPS )
		#define SPOT_LIGHT_MAP_INDEX UNROLLED_LOOP_INDEX
		#elif ( UNROLLED_LOOP_INDEX < NUM_SPOT_LIGHT_SHADOWS )
		#define SPOT_LIGHT_MAP_INDEX NUM_SPOT_LIGHT_MAPS
		#else
		#define SPOT_LIGHT_MAP_INDEX ( UNROLLED_LOOP_INDEX - NUM_SPOT_LIGHT_SHADOWS + NUM_SPOT_LIGHT_SHADOWS_WITH_MAPS )
		#endif
		#if ( SPOT_LIGHT_MAP_INDEX < NUM_SPOT_LIGHT_MAPS )
		spotLightCoord = vSpotLightCoord[ i ].xyz / vSpotLightCoord[ i ].w;
		inSpotLightMap = all( lessThan( abs( spotLightCoord * 2. - 1. ), vec3( 1.0 ) ) );
		spotColor = texture( spotLightMap[ SPOT_LIGHT_MAP_INDEX ], spotLightCoord.xy );
		directLight.color = inSpotLightMap ? directLight.color * spotColor.rgb : directLight.color;
		#endif
		#undef SPOT_LIGHT_MAP_INDEX
		#if defined( USE_SHADOWMAP ) && ( UNROLLED_LOOP_INDEX < NUM_SPOT_LIGHT_SHADOWS ) && defined( RECEIVE_SHADOW )
		spotLightShadow = spotLightShadows[ i ];
		directLight.color *= ( directLight.visible ) ? getShadow( spotShadowMap[ i ], spotLightShadow.shadowMapSize, spotLightShadow.shadowIntensity, spotLightShadow.shadowBias, spotLightShadow.shadowRadius, vSpotLightCoord[ i ] ) : 1.0;
		#endif
		RE_Direct( directLight, geometryPosition, geometryNormal, geometryViewDir, material, reflectedLight );
	}
	#pragma unroll_loop_end
#endif
#if NUM_DIR_LIGHTS > 0
	DirectionalLight directionalLight;
	#if defined( USE_SHADOWMAP ) && NUM_DIR_LIGHT_SHADOWS > 0
	DirectionalLightShadow directionalLightShadow;
	#endif
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_DIR_LIGHTS; i ++ ) {
		directionalLight = directionalLights[ i ];
		getDirectionalLightInfo( directionalLight, directLight );
		#if defined( USE_SHADOWMAP ) && ( UNROLLED_LOOP_INDEX < NUM_DIR_LIGHT_SHADOWS ) && defined( RECEIVE_SHADOW )
		directionalLightShadow = directionalLightShadows[ i ];
		directLight.color *= ( directLight.visible ) ? getShadow( directionalShadowMap[ i ], directionalLightShadow.shadowMapSize, directionalLightShadow.shadowIntensity, directionalLightShadow.shadowBias, directionalLightShadow.shadowRadius, vDirectionalShadowCoord[ i ] ) : 1.0;
		#endif
		RE_Direct( directLight, geometryPosition, geometryNormal, geometryViewDir, material, reflectedLight );
	}
	#pragma unroll_loop_end
#endif
#if NUM_RECT_AREA_LIGHTS > 0
	RectAreaLight rectAreaLight;
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_RECT_AREA_LIGHTS; i ++ ) {
		rectAreaLight = rectAreaLights[ i ];
		directLight.direction = normalize( rectAreaLight.position - geometryPosition );
		directLight.color = rectAreaLight.color * length( cross( rectAreaLight.halfWidth, rectAreaLight.halfHeight ) ) * 4.0 / max( dot( rectAreaLight.position - geometryPosition, rectAreaLight.position - geometryPosition ), EPSILON );
		directLight.visible = true;
		RE_Direct( directLight, geometryPosition, geometryNormal, geometryViewDir, material, reflectedLight );
	}
	#pragma unroll_loop_end
#endif
	vec3 irradiance = ambientLightColor;
	irradiance += getLightProbeIrradiance( lightProbe, geometryNormal );
#if NUM_HEMI_LIGHTS > 0
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_HEMI_LIGHTS; i ++ ) {
		irradiance += getHemisphereLightIrradiance( hemisphereLights[ i ], geometryNormal );
	}
	#pragma unroll_loop_end
#endif
"#;

const LIGHTS_FRAGMENT_END: &str = r#"
	RE_IndirectDiffuse( irradiance, material, reflectedLight );
"#;

const SHADOWMAP_PARS_FRAGMENT: &str = r#"
#if NUM_SPOT_LIGHT_MAPS > 0
uniform sampler2D spotLightMap[NUM_SPOT_LIGHT_MAPS];
#endif
#if NUM_SPOT_LIGHT_COORDS > 0
in vec4 vSpotLightCoord[NUM_SPOT_LIGHT_COORDS];
#endif
#ifdef USE_SHADOWMAP
#include <shadow_structs>
#if NUM_DIR_LIGHT_SHADOWS > 0
uniform sampler2D directionalShadowMap[NUM_DIR_LIGHT_SHADOWS];
in vec4 vDirectionalShadowCoord[NUM_DIR_LIGHT_SHADOWS];
uniform DirectionalLightShadow directionalLightShadows[NUM_DIR_LIGHT_SHADOWS];
#endif
#if NUM_SPOT_LIGHT_SHADOWS > 0
uniform sampler2D spotShadowMap[NUM_SPOT_LIGHT_SHADOWS];
uniform SpotLightShadow spotLightShadows[NUM_SPOT_LIGHT_SHADOWS];
#endif
#if NUM_POINT_LIGHT_SHADOWS > 0
uniform sampler2D pointShadowMap[NUM_POINT_LIGHT_SHADOWS];
in vec4 vPointShadowCoord[NUM_POINT_LIGHT_SHADOWS];
uniform PointLightShadow pointLightShadows[NUM_POINT_LIGHT_SHADOWS];
#endif
float texture2DCompare( sampler2D depths, vec2 uv, float compare ) {
	return step( compare, unpackRGBAToDepth( texture( depths, uv ) ) );
}
vec2 texture2DDistribution( sampler2D shadow, vec2 uv ) {
	return texture( shadow, uv ).rg;
}
float VSMShadow( sampler2D shadow, vec2 uv, float compare ) {
	float occlusion = 1.0;
	vec2 distribution = texture2DDistribution( shadow, uv );
	float hard_shadow = step( compare, distribution.x );
	if ( hard_shadow != 1.0 ) {
		float distance = compare - distribution.x;
		float variance = max( 0.00000, distribution.y * distribution.y );
		float softness_probability = variance / ( variance + distance * distance );
		softness_probability = clamp( ( softness_probability - 0.3 ) / ( 0.95 - 0.3 ), 0.0, 1.0 );
		occlusion = clamp( max( hard_shadow, softness_probability ), 0.0, 1.0 );
	}
	return occlusion;
}
float getShadow( sampler2D shadowMap, vec2 shadowMapSize, float shadowIntensity, float shadowBias, float shadowRadius, vec4 shadowCoord ) {
	float shadow = 1.0;
	shadowCoord.xyz /= shadowCoord.w;
	shadowCoord.z += shadowBias;
	bool inFrustum = shadowCoord.x >= 0.0 && shadowCoord.x <= 1.0 && shadowCoord.y >= 0.0 && shadowCoord.y <= 1.0;
	bool frustumTest = inFrustum && shadowCoord.z <= 1.0;
	if ( frustumTest ) {
	#if defined( SHADOWMAP_TYPE_PCF )
		vec2 texelSize = vec2( 1.0 ) / shadowMapSize;
		float dx0 = - texelSize.x * shadowRadius;
		float dy0 = - texelSize.y * shadowRadius;
		float dx1 = + texelSize.x * shadowRadius;
		float dy1 = + texelSize.y * shadowRadius;
		shadow = (
			texture2DCompare( shadowMap, shadowCoord.xy + vec2( dx0, dy0 ), shadowCoord.z ) +
			texture2DCompare( shadowMap, shadowCoord.xy + vec2( 0.0, dy0 ), shadowCoord.z ) +
			texture2DCompare( shadowMap, shadowCoord.xy + vec2( dx1, dy0 ), shadowCoord.z ) +
			texture2DCompare( shadowMap, shadowCoord.xy + vec2( dx0, 0.0 ), shadowCoord.z ) +
			texture2DCompare( shadowMap, shadowCoord.xy, shadowCoord.z ) +
			texture2DCompare( shadowMap, shadowCoord.xy + vec2( dx1, 0.0 ), shadowCoord.z ) +
			texture2DCompare( shadowMap, shadowCoord.xy + vec2( dx0, dy1 ), shadowCoord.z ) +
			texture2DCompare( shadowMap, shadowCoord.xy + vec2( 0.0, dy1 ), shadowCoord.z ) +
			texture2DCompare( shadowMap, shadowCoord.xy + vec2( dx1, dy1 ), shadowCoord.z )
		) * ( 1.0 / 9.0 );
	#elif defined( SHADOWMAP_TYPE_PCF_SOFT )
		vec2 texelSize = vec2( 1.0 ) / shadowMapSize;
		vec2 uv = shadowCoord.xy * shadowMapSize + 0.5;
		vec2 f = fract( uv );
		uv = ( floor( uv ) - 0.5 ) * texelSize;
		float dx = texelSize.x;
		float dy = texelSize.y;
		shadow = mix(
			mix( texture2DCompare( shadowMap, uv, shadowCoord.z ), texture2DCompare( shadowMap, uv + vec2( dx, 0.0 ), shadowCoord.z ), f.x ),
			mix( texture2DCompare( shadowMap, uv + vec2( 0.0, dy ), shadowCoord.z ), texture2DCompare( shadowMap, uv + vec2( dx, dy ), shadowCoord.z ), f.x ),
			f.y );
	#elif defined( SHADOWMAP_TYPE_VSM )
		shadow = VSMShadow( shadowMap, shadowCoord.xy, shadowCoord.z );
	#else
		shadow = texture2DCompare( shadowMap, shadowCoord.xy, shadowCoord.z );
	#endif
	}
	return mix( 1.0, shadow, shadowIntensity );
}
vec2 cubeToUV( vec3 v, float texelSizeY ) {
	vec3 absV = abs( v );
	float scaleToCube = 1.0 / max( absV.x, max( absV.y, absV.z ) );
	absV *= scaleToCube;
	v *= scaleToCube * ( 1.0 - 2.0 * texelSizeY );
	vec2 planar = v.xy;
	float almostATexel = 1.5 * texelSizeY;
	float almostOne = 1.0 - almostATexel;
	if ( absV.z >= almostOne ) {
		if ( v.z > 0.0 ) planar.x = 4.0 - v.x;
	} else if ( absV.x >= almostOne ) {
		float signX = sign( v.x );
		planar.x = v.z * signX + 2.0 * signX;
	} else if ( absV.y >= almostOne ) {
		float signY = sign( v.y );
		planar.x = v.x + 2.0 * signY + 2.0;
		planar.y = v.z * signY - 2.0;
	}
	return vec2( 0.125, 0.25 ) * planar + vec2( 0.375, 0.75 );
}
float getPointShadow( sampler2D shadowMap, vec2 shadowMapSize, float shadowIntensity, float shadowBias, float shadowRadius, vec4 shadowCoord, float shadowCameraNear, float shadowCameraFar ) {
	float shadow = 1.0;
	vec2 texelSize = vec2( 1.0 ) / ( shadowMapSize * vec2( 4.0, 2.0 ) );
	vec3 lightToPosition = shadowCoord.xyz;
	float lightToPositionLength = length( lightToPosition );
	if ( lightToPositionLength - shadowCameraFar <= 0.0 && lightToPositionLength - shadowCameraNear >= 0.0 ) {
		float dp = ( lightToPositionLength - shadowCameraNear ) / ( shadowCameraFar - shadowCameraNear );
		dp += shadowBias;
		vec3 bd3D = normalize( lightToPosition );
	#if defined( SHADOWMAP_TYPE_PCF ) || defined( SHADOWMAP_TYPE_PCF_SOFT ) || defined( SHADOWMAP_TYPE_VSM )
		vec2 offset = vec2( - 1, 1 ) * shadowRadius * texelSize.y;
		shadow = (
			texture2DCompare( shadowMap, cubeToUV( bd3D + offset.xyy, texelSize.y ), dp ) +
			texture2DCompare( shadowMap, cubeToUV( bd3D + offset.yyy, texelSize.y ), dp ) +
			texture2DCompare( shadowMap, cubeToUV( bd3D + offset.xyx, texelSize.y ), dp ) +
			texture2DCompare( shadowMap, cubeToUV( bd3D + offset.yyx, texelSize.y ), dp ) +
			texture2DCompare( shadowMap, cubeToUV( bd3D, texelSize.y ), dp )
		) * ( 1.0 / 5.0 );
	#else
		shadow = texture2DCompare( shadowMap, cubeToUV( bd3D, texelSize.y ), dp );
	#endif
	}
	return mix( 1.0, shadow, shadowIntensity );
}
#endif
"#;

/// Combined shadow factor for surfaces that only display shadows.
const SHADOWMASK_PARS_FRAGMENT: &str = r#"
float getShadowMask() {
	float shadow = 1.0;
#if defined( USE_SHADOWMAP ) && defined( RECEIVE_SHADOW )
	#if NUM_DIR_LIGHT_SHADOWS > 0
	DirectionalLightShadow directionalLight;
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_DIR_LIGHT_SHADOWS; i ++ ) {
		directionalLight = directionalLightShadows[ i ];
		shadow *= getShadow( directionalShadowMap[ i ], directionalLight.shadowMapSize, directionalLight.shadowIntensity, directionalLight.shadowBias, directionalLight.shadowRadius, vDirectionalShadowCoord[ i ] );
	}
	#pragma unroll_loop_end
	#endif
	#if NUM_SPOT_LIGHT_SHADOWS > 0
	SpotLightShadow spotLight;
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_SPOT_LIGHT_SHADOWS; i ++ ) {
		spotLight = spotLightShadows[ i ];
		shadow *= getShadow( spotShadowMap[ i ], spotLight.shadowMapSize, spotLight.shadowIntensity, spotLight.shadowBias, spotLight.shadowRadius, vSpotLightCoord[ i ] );
	}
	#pragma unroll_loop_end
	#endif
	#if NUM_POINT_LIGHT_SHADOWS > 0
	PointLightShadow pointLight;
	#pragma unroll_loop_start
	for ( int i = 0; i < NUM_POINT_LIGHT_SHADOWS; i ++ ) {
		pointLight = pointLightShadows[ i ];
		shadow *= getPointShadow( pointShadowMap[ i ], pointLight.shadowMapSize, pointLight.shadowIntensity, pointLight.shadowBias, pointLight.shadowRadius, vPointShadowCoord[ i ], pointLight.shadowCameraNear, pointLight.shadowCameraFar );
	}
	#pragma unroll_loop_end
	#endif
#endif
	return shadow;
}
"#;

const TRANSMISSION_PARS_FRAGMENT: &str = r#"
#ifdef USE_TRANSMISSION
uniform mat4 projectionMatrix;
uniform float transmission;
uniform float thickness;
uniform float attenuationDistance;
uniform vec3 attenuationColor;
uniform sampler2D transmissionSamplerMap;
uniform vec2 transmissionSamplerSize;
#ifdef USE_TRANSMISSIONMAP
uniform sampler2D transmissionMap;
#endif
#ifdef USE_THICKNESSMAP
uniform sampler2D thicknessMap;
#endif
vec3 volumeAttenuation( const in float transmissionDistance, const in vec3 attenuationColor, const in float attenuationDistance ) {
	if ( isinf( attenuationDistance ) ) {
		return vec3( 1.0 );
	}
	vec3 attenuationCoefficient = - log( attenuationColor ) / attenuationDistance;
	return exp( - attenuationCoefficient * transmissionDistance );
}
#endif
"#;

const TRANSMISSION_FRAGMENT: &str = r#"
#ifdef USE_TRANSMISSION
	float transmissionFactor = transmission;
	float thicknessFactor = thickness;
	#ifdef USE_TRANSMISSIONMAP
	transmissionFactor *= texture( transmissionMap, vUv ).r;
	#endif
	#ifdef USE_THICKNESSMAP
	thicknessFactor *= texture( thicknessMap, vUv ).g;
	#endif
	vec3 refractionVector = refract( - geometryViewDir, normal, 1.0 / ior );
	vec4 refractedClip = projectionMatrix * vec4( geometryPosition + refractionVector * thicknessFactor, 1.0 );
	vec2 refractionCoords = refractedClip.xy / refractedClip.w * 0.5 + 0.5;
	vec3 transmitted = texture( transmissionSamplerMap, refractionCoords ).rgb;
	transmitted *= volumeAttenuation( thicknessFactor, attenuationColor, attenuationDistance );
	totalDiffuse = mix( totalDiffuse, transmitted * diffuseColor.rgb, transmissionFactor );
	diffuseColor.a *= 1.0 - transmissionFactor * ( 1.0 - luminance( transmitted ) );
#endif
"#;

const TONEMAPPING_PARS_FRAGMENT: &str = r#"
#ifndef saturate
#define saturate( a ) clamp( a, 0.0, 1.0 )
#endif
uniform float toneMappingExposure;
vec3 LinearToneMapping( vec3 color ) {
	return saturate( toneMappingExposure * color );
}
vec3 ReinhardToneMapping( vec3 color ) {
	color *= toneMappingExposure;
	return saturate( color / ( vec3( 1.0 ) + color ) );
}
vec3 CineonToneMapping( vec3 color ) {
	color *= toneMappingExposure;
	color = max( vec3( 0.0 ), color - 0.004 );
	return pow( ( color * ( 6.2 * color + 0.5 ) ) / ( color * ( 6.2 * color + 1.7 ) + 0.06 ), vec3( 2.2 ) );
}
vec3 RRTAndODTFit( vec3 v ) {
	vec3 a = v * ( v + 0.0245786 ) - 0.000090537;
	vec3 b = v * ( 0.983729 * v + 0.4329510 ) + 0.238081;
	return a / b;
}
vec3 ACESFilmicToneMapping( vec3 color ) {
	const mat3 ACESInputMat = mat3( vec3( 0.59719, 0.07600, 0.02840 ), vec3( 0.35458, 0.90834, 0.13383 ), vec3( 0.04823, 0.01566, 0.83777 ) );
	const mat3 ACESOutputMat = mat3( vec3( 1.60475, -0.10208, -0.00327 ), vec3( -0.53108, 1.10813, -0.07276 ), vec3( -0.07367, -0.00605, 1.07602 ) );
	color *= toneMappingExposure / 0.6;
	color = ACESInputMat * color;
	color = RRTAndODTFit( color );
	color = ACESOutputMat * color;
	return saturate( color );
}
vec3 AgXToneMapping( vec3 color ) {
	color *= toneMappingExposure;
	color = max( color, 1e-10 );
	color = log2( color );
	color = ( color + 12.47393 ) / 16.5;
	color = clamp( color, 0.0, 1.0 );
	vec3 x2 = color * color;
	vec3 x4 = x2 * x2;
	return saturate( 15.5 * x4 * x2 - 40.14 * x4 * color + 31.96 * x4 - 6.868 * x2 * color + 0.4298 * x2 + 0.1191 * color - 0.00232 );
}
vec3 NeutralToneMapping( vec3 color ) {
	const float StartCompression = 0.8 - 0.04;
	const float Desaturation = 0.15;
	color *= toneMappingExposure;
	float x = min( color.r, min( color.g, color.b ) );
	float offset = x < 0.08 ? x - 6.25 * x * x : 0.04;
	color -= offset;
	float peak = max( color.r, max( color.g, color.b ) );
	if ( peak < StartCompression ) return color;
	float d = 1. - StartCompression;
	float newPeak = 1. - d * d / ( peak + d - StartCompression );
	color *= newPeak / peak;
	float g = 1. - 1. / ( Desaturation * ( peak - newPeak ) + 1. );
	return mix( color, vec3( newPeak ), g );
}
"#;

const TONEMAPPING_FRAGMENT: &str = r#"
#if defined( TONE_MAPPING )
	gl_FragColor.rgb = toneMapping( gl_FragColor.rgb );
#endif
"#;

const COLORSPACE_PARS_FRAGMENT: &str = r#"
vec4 sRGBTransferOETF( in vec4 value ) {
	return vec4( mix( pow( value.rgb, vec3( 0.41666 ) ) * 1.055 - vec3( 0.055 ), value.rgb * 12.92, vec3( lessThanEqual( value.rgb, vec3( 0.0031308 ) ) ) ), value.a );
}
vec4 linearToOutputTexel( vec4 value ) {
#ifdef OUTPUT_SRGB
	return sRGBTransferOETF( value );
#else
	return value;
#endif
}
"#;

const COLORSPACE_FRAGMENT: &str = r#"
	gl_FragColor = linearToOutputTexel( gl_FragColor );
"#;

const PREMULTIPLIED_ALPHA_FRAGMENT: &str = r#"
#ifdef PREMULTIPLIED_ALPHA
	gl_FragColor.rgb *= gl_FragColor.a;
#endif
"#;

const DITHERING_PARS_FRAGMENT: &str = r#"
#ifdef DITHERING
vec3 dithering( vec3 color ) {
	float grid_position = fract( dot( gl_FragCoord.xy, vec2( 1.0 / 4.0, 1.0 / 16.0 ) * 4.0 ) );
	vec3 dither_shift_RGB = vec3( 0.25 / 255.0, -0.25 / 255.0, 0.25 / 255.0 );
	dither_shift_RGB = mix( 2.0 * dither_shift_RGB, -2.0 * dither_shift_RGB, grid_position );
	return color + dither_shift_RGB;
}
#endif
"#;

const DITHERING_FRAGMENT: &str = r#"
#ifdef DITHERING
	gl_FragColor.rgb = dithering( gl_FragColor.rgb );
#endif
"#;

// =============================================================================
// Templates
// =============================================================================

const BASIC_VERT: &str = r#"
#include <common>
#include <uv_pars_vertex>
#include <color_pars_vertex>
#include <fog_pars_vertex>
#include <morphtarget_pars_vertex>
#include <skinning_pars_vertex>
#include <logdepthbuf_pars_vertex>
#include <clipping_planes_pars_vertex>
#ifdef USE_ENVMAP
out vec3 vWorldPosition;
out vec3 vWorldNormal;
#endif
void main() {
#include <uv_vertex>
#include <color_vertex>
#include <beginnormal_vertex>
#include <morphnormal_vertex>
#include <skinbase_vertex>
#include <skinnormal_vertex>
#include <defaultnormal_vertex>
#include <begin_vertex>
#include <morphtarget_vertex>
#include <skinning_vertex>
#include <project_vertex>
#include <logdepthbuf_vertex>
#include <clipping_planes_vertex>
#include <worldpos_vertex>
#ifdef USE_ENVMAP
	vWorldPosition = worldPosition.xyz;
	vWorldNormal = inverseTransformDirection( transformedNormal, viewMatrix );
#endif
#include <fog_vertex>
}
"#;

const BASIC_FRAG: &str = r#"
uniform vec3 diffuse;
uniform float opacity;
#include <common>
#include <dithering_pars_fragment>
#include <color_pars_fragment>
#include <uv_pars_fragment>
#include <map_pars_fragment>
#include <alphamap_pars_fragment>
#include <alphatest_pars_fragment>
#include <aomap_pars_fragment>
#include <lightmap_pars_fragment>
#include <specularmap_pars_fragment>
#include <envmap_pars_fragment>
#include <fog_pars_fragment>
#include <logdepthbuf_pars_fragment>
#include <clipping_planes_pars_fragment>
#include <tonemapping_pars_fragment>
#include <colorspace_pars_fragment>
#ifdef USE_ENVMAP
in vec3 vWorldPosition;
in vec3 vWorldNormal;
#endif
struct ReflectedLight {
	vec3 directDiffuse;
	vec3 directSpecular;
	vec3 indirectDiffuse;
	vec3 indirectSpecular;
};
void main() {
	vec4 diffuseColor = vec4( diffuse, opacity );
#include <clipping_planes_fragment>
#include <logdepthbuf_fragment>
#include <map_fragment>
#include <color_fragment>
#include <alphamap_fragment>
#include <alphatest_fragment>
#include <specularmap_fragment>
	ReflectedLight reflectedLight = ReflectedLight( vec3( 0.0 ), vec3( 0.0 ), vec3( 0.0 ), vec3( 0.0 ) );
#ifdef USE_LIGHTMAP
	reflectedLight.indirectDiffuse += texture( lightMap, vUv ).rgb * lightMapIntensity;
#else
	reflectedLight.indirectDiffuse += vec3( 1.0 );
#endif
#include <aomap_fragment>
	reflectedLight.indirectDiffuse *= diffuseColor.rgb;
	vec3 outgoingLight = reflectedLight.indirectDiffuse;
#include <envmap_fragment>
	gl_FragColor = vec4( outgoingLight, diffuseColor.a );
#include <tonemapping_fragment>
#include <colorspace_fragment>
#include <fog_fragment>
#include <premultiplied_alpha_fragment>
#include <dithering_fragment>
}
"#;

const LIT_VERT: &str = r#"
out vec3 vViewPosition;
#include <common>
#include <uv_pars_vertex>
#include <displacementmap_pars_vertex>
#include <color_pars_vertex>
#include <fog_pars_vertex>
#include <normal_pars_vertex>
#include <morphtarget_pars_vertex>
#include <skinning_pars_vertex>
#include <shadowmap_pars_vertex>
#include <logdepthbuf_pars_vertex>
#include <clipping_planes_pars_vertex>
#if defined( USE_ENVMAP ) || defined( USE_TRANSMISSION )
out vec3 vWorldPosition;
out vec3 vWorldNormal;
#endif
void main() {
#include <uv_vertex>
#include <color_vertex>
#include <beginnormal_vertex>
#include <morphnormal_vertex>
#include <skinbase_vertex>
#include <skinnormal_vertex>
#include <defaultnormal_vertex>
#include <normal_vertex>
#include <begin_vertex>
#include <morphtarget_vertex>
#include <skinning_vertex>
#include <displacementmap_vertex>
#include <project_vertex>
#include <logdepthbuf_vertex>
#include <clipping_planes_vertex>
	vViewPosition = - mvPosition.xyz;
#include <worldpos_vertex>
#if defined( USE_ENVMAP ) || defined( USE_TRANSMISSION )
	vWorldPosition = worldPosition.xyz;
	vWorldNormal = inverseTransformDirection( transformedNormal, viewMatrix );
#endif
#include <shadowmap_vertex>
#include <fog_vertex>
}
"#;

const LIT_FRAG: &str = r#"
uniform vec3 diffuse;
uniform vec3 emissive;
uniform float opacity;
#ifdef PHONG
uniform vec3 specular;
uniform float shininess;
#endif
#ifdef STANDARD
uniform float roughness;
uniform float metalness;
#endif
#ifdef PHYSICAL
uniform float ior;
#ifdef USE_CLEARCOAT
uniform float clearcoat;
uniform float clearcoatRoughness;
#endif
#endif
in vec3 vViewPosition;
#if defined( USE_ENVMAP ) || defined( USE_TRANSMISSION )
in vec3 vWorldPosition;
in vec3 vWorldNormal;
#endif
#include <common>
#include <packing>
#include <dithering_pars_fragment>
#include <color_pars_fragment>
#include <uv_pars_fragment>
#include <map_pars_fragment>
#include <alphamap_pars_fragment>
#include <alphatest_pars_fragment>
#include <aomap_pars_fragment>
#include <lightmap_pars_fragment>
#include <emissivemap_pars_fragment>
#include <envmap_pars_fragment>
#include <fog_pars_fragment>
#include <bsdfs>
#include <lights_pars_begin>
#include <lights_model_pars_fragment>
#include <normal_pars_fragment>
#include <shadowmap_pars_fragment>
#include <bumpmap_pars_fragment>
#include <normalmap_pars_fragment>
#include <specularmap_pars_fragment>
#include <roughnessmap_pars_fragment>
#include <metalnessmap_pars_fragment>
#include <transmission_pars_fragment>
#include <logdepthbuf_pars_fragment>
#include <clipping_planes_pars_fragment>
#include <tonemapping_pars_fragment>
#include <colorspace_pars_fragment>
void main() {
	vec4 diffuseColor = vec4( diffuse, opacity );
#include <clipping_planes_fragment>
	ReflectedLight reflectedLight = ReflectedLight( vec3( 0.0 ), vec3( 0.0 ), vec3( 0.0 ), vec3( 0.0 ) );
	vec3 totalEmissiveRadiance = emissive;
#include <logdepthbuf_fragment>
#include <map_fragment>
#include <color_fragment>
#include <alphamap_fragment>
#include <alphatest_fragment>
#include <specularmap_fragment>
#include <normal_fragment_begin>
#include <normal_fragment_maps>
#include <emissivemap_fragment>
	SurfaceMaterial material;
	material.diffuseColor = diffuseColor.rgb;
	material.specularStrength = specularStrength;
	material.specularF90 = 1.0;
#if defined( STANDARD )
	#include <roughnessmap_fragment>
	#include <metalnessmap_fragment>
	material.diffuseColor = diffuseColor.rgb * ( 1.0 - metalnessFactor );
	material.roughness = clamp( roughnessFactor, 0.0525, 1.0 );
	material.specularColor = mix( vec3( 0.04 ), diffuseColor.rgb, metalnessFactor );
#elif defined( PHONG )
	material.specularColor = specular;
	material.specularShininess = shininess;
#endif
#include <lights_fragment_begin>
#include <lightmap_fragment>
#include <lights_fragment_end>
#include <aomap_fragment>
	vec3 totalDiffuse = reflectedLight.directDiffuse + reflectedLight.indirectDiffuse;
	vec3 totalSpecular = reflectedLight.directSpecular + reflectedLight.indirectSpecular;
#include <transmission_fragment>
	vec3 outgoingLight = totalDiffuse + totalSpecular + totalEmissiveRadiance;
#include <envmap_fragment>
	gl_FragColor = vec4( outgoingLight, diffuseColor.a );
#include <tonemapping_fragment>
#include <colorspace_fragment>
#include <fog_fragment>
#include <premultiplied_alpha_fragment>
#include <dithering_fragment>
}
"#;

const NORMAL_VERT: &str = r#"
out vec3 vViewPosition;
#include <common>
#include <uv_pars_vertex>
#include <displacementmap_pars_vertex>
#include <normal_pars_vertex>
#include <morphtarget_pars_vertex>
#include <skinning_pars_vertex>
#include <logdepthbuf_pars_vertex>
#include <clipping_planes_pars_vertex>
void main() {
#include <uv_vertex>
#include <beginnormal_vertex>
#include <morphnormal_vertex>
#include <skinbase_vertex>
#include <skinnormal_vertex>
#include <defaultnormal_vertex>
#include <normal_vertex>
#include <begin_vertex>
#include <morphtarget_vertex>
#include <skinning_vertex>
#include <displacementmap_vertex>
#include <project_vertex>
#include <logdepthbuf_vertex>
#include <clipping_planes_vertex>
	vViewPosition = - mvPosition.xyz;
}
"#;

const NORMAL_FRAG: &str = r#"
uniform float opacity;
in vec3 vViewPosition;
#include <common>
#include <uv_pars_fragment>
#include <normal_pars_fragment>
#include <bumpmap_pars_fragment>
#include <normalmap_pars_fragment>
#include <logdepthbuf_pars_fragment>
#include <clipping_planes_pars_fragment>
void main() {
	vec4 diffuseColor = vec4( 0.0, 0.0, 0.0, opacity );
#include <clipping_planes_fragment>
#include <logdepthbuf_fragment>
#include <normal_fragment_begin>
#include <normal_fragment_maps>
	gl_FragColor = vec4( normalize( normal ) * 0.5 + 0.5, diffuseColor.a );
}
"#;

const DEPTH_VERT: &str = r#"
#include <common>
#include <uv_pars_vertex>
#include <displacementmap_pars_vertex>
#include <morphtarget_pars_vertex>
#include <skinning_pars_vertex>
#include <logdepthbuf_pars_vertex>
#include <clipping_planes_pars_vertex>
out vec2 vHighPrecisionZW;
void main() {
#include <uv_vertex>
#include <skinbase_vertex>
#include <beginnormal_vertex>
#include <begin_vertex>
#include <morphtarget_vertex>
#include <skinning_vertex>
#include <displacementmap_vertex>
#include <project_vertex>
#include <logdepthbuf_vertex>
#include <clipping_planes_vertex>
	vHighPrecisionZW = gl_Position.zw;
}
"#;

const DEPTH_FRAG: &str = r#"
uniform float opacity;
#include <common>
#include <packing>
#include <uv_pars_fragment>
#include <map_pars_fragment>
#include <alphamap_pars_fragment>
#include <alphatest_pars_fragment>
#include <logdepthbuf_pars_fragment>
#include <clipping_planes_pars_fragment>
in vec2 vHighPrecisionZW;
void main() {
	vec4 diffuseColor = vec4( 1.0 );
	diffuseColor.a = opacity;
#include <clipping_planes_fragment>
#include <map_fragment>
#include <alphamap_fragment>
#include <alphatest_fragment>
#include <logdepthbuf_fragment>
#ifdef USE_REVERSEDEPTHBUF
	float fragCoordZ = vHighPrecisionZW[ 0 ] / vHighPrecisionZW[ 1 ];
#else
	float fragCoordZ = 0.5 * vHighPrecisionZW[ 0 ] / vHighPrecisionZW[ 1 ] + 0.5;
#endif
#ifdef DEPTH_PACKING_RGBA
	gl_FragColor = packDepthToRGBA( fragCoordZ );
#else
	gl_FragColor = vec4( vec3( 1.0 - fragCoordZ ), opacity );
#endif
}
"#;

const DISTANCE_VERT: &str = r#"
#define DISTANCE
out vec3 vWorldPosition;
#include <common>
#include <uv_pars_vertex>
#include <displacementmap_pars_vertex>
#include <morphtarget_pars_vertex>
#include <skinning_pars_vertex>
#include <clipping_planes_pars_vertex>
void main() {
#include <uv_vertex>
#include <skinbase_vertex>
#include <beginnormal_vertex>
#include <begin_vertex>
#include <morphtarget_vertex>
#include <skinning_vertex>
#include <displacementmap_vertex>
#include <project_vertex>
#include <worldpos_vertex>
#include <clipping_planes_vertex>
	vWorldPosition = worldPosition.xyz;
}
"#;

const DISTANCE_FRAG: &str = r#"
#define DISTANCE
uniform vec3 referencePosition;
uniform float nearDistance;
uniform float farDistance;
uniform float opacity;
in vec3 vWorldPosition;
#include <common>
#include <packing>
#include <uv_pars_fragment>
#include <map_pars_fragment>
#include <alphamap_pars_fragment>
#include <alphatest_pars_fragment>
#include <clipping_planes_pars_fragment>
void main() {
	vec4 diffuseColor = vec4( 1.0 );
	diffuseColor.a = opacity;
#include <clipping_planes_fragment>
#include <map_fragment>
#include <alphamap_fragment>
#include <alphatest_fragment>
	float dist = length( vWorldPosition - referencePosition );
	dist = ( dist - nearDistance ) / ( farDistance - nearDistance );
	dist = saturate( dist );
	gl_FragColor = packDepthToRGBA( dist );
}
"#;

const SHADOW_VERT: &str = r#"
#include <common>
#include <fog_pars_vertex>
#include <morphtarget_pars_vertex>
#include <skinning_pars_vertex>
#include <logdepthbuf_pars_vertex>
#include <shadowmap_pars_vertex>
void main() {
#include <beginnormal_vertex>
#include <morphnormal_vertex>
#include <skinbase_vertex>
#include <skinnormal_vertex>
#include <defaultnormal_vertex>
#include <begin_vertex>
#include <morphtarget_vertex>
#include <skinning_vertex>
#include <project_vertex>
#include <logdepthbuf_vertex>
#include <worldpos_vertex>
#include <shadowmap_vertex>
#include <fog_vertex>
}
"#;

const SHADOW_FRAG: &str = r#"
uniform vec3 color;
uniform float opacity;
#include <common>
#include <packing>
#include <fog_pars_fragment>
#include <bsdfs>
#include <lights_pars_begin>
#include <logdepthbuf_pars_fragment>
#include <shadowmap_pars_fragment>
#include <shadowmask_pars_fragment>
#include <tonemapping_pars_fragment>
#include <colorspace_pars_fragment>
void main() {
#include <logdepthbuf_fragment>
	gl_FragColor = vec4( color, opacity * ( 1.0 - getShadowMask() ) );
#include <tonemapping_fragment>
#include <colorspace_fragment>
#include <fog_fragment>
}
"#;

const BLUR_VERT: &str = r#"
void main() {
	gl_Position = vec4( position, 1.0 );
}
"#;

/// Separable mean/variance blur over a VSM map.
const BLUR_FRAG: &str = r#"
#include <packing>
uniform sampler2D shadow_pass;
uniform vec2 resolution;
uniform float radius;
void main() {
	const float samples = float( VSM_SAMPLES );
	float mean = 0.0;
	float squared_mean = 0.0;
	float uvStride = samples <= 1.0 ? 0.0 : 2.0 / ( samples - 1.0 );
	float uvStart = samples <= 1.0 ? 0.0 : - 1.0;
	for ( float i = 0.0; i < samples; i ++ ) {
		float uvOffset = uvStart + i * uvStride;
#ifdef HORIZONTAL_PASS
		vec2 distribution = texture( shadow_pass, ( gl_FragCoord.xy + vec2( uvOffset, 0.0 ) * radius ) / resolution ).rg;
		mean += distribution.x;
		squared_mean += distribution.y * distribution.y + distribution.x * distribution.x;
#else
		float depth = unpackRGBAToDepth( texture( shadow_pass, ( gl_FragCoord.xy + vec2( 0.0, uvOffset ) * radius ) / resolution ) );
		mean += depth;
		squared_mean += depth * depth;
#endif
	}
	mean = mean / samples;
	squared_mean = squared_mean / samples;
	float std_dev = sqrt( max( squared_mean - mean * mean, 0.0 ) );
	gl_FragColor = vec4( mean, std_dev, 0.0, 1.0 );
}
"#;

const POINTS_VERT: &str = r#"
uniform float size;
uniform float scale;
#include <common>
#include <color_pars_vertex>
#include <fog_pars_vertex>
#include <morphtarget_pars_vertex>
#include <logdepthbuf_pars_vertex>
#include <clipping_planes_pars_vertex>
#ifdef USE_MAP
uniform mat3 mapTransform;
out vec2 vMapUv;
#endif
void main() {
#ifdef USE_MAP
	vMapUv = ( mapTransform * vec3( uv, 1 ) ).xy;
#endif
#include <color_vertex>
#include <begin_vertex>
#include <morphtarget_vertex>
#include <project_vertex>
	gl_PointSize = size;
#ifdef USE_SIZEATTENUATION
	bool isPerspective = !isOrthographic;
	if ( isPerspective ) gl_PointSize *= ( scale / - mvPosition.z );
#endif
#include <logdepthbuf_vertex>
#include <clipping_planes_vertex>
#include <fog_vertex>
}
"#;

const POINTS_FRAG: &str = r#"
uniform vec3 diffuse;
uniform float opacity;
#include <common>
#include <color_pars_fragment>
#include <alphatest_pars_fragment>
#include <fog_pars_fragment>
#include <logdepthbuf_pars_fragment>
#include <clipping_planes_pars_fragment>
#include <tonemapping_pars_fragment>
#include <colorspace_pars_fragment>
#ifdef USE_MAP
uniform sampler2D map;
in vec2 vMapUv;
#endif
#ifdef USE_ALPHAMAP
uniform sampler2D alphaMap;
#endif
void main() {
	vec4 diffuseColor = vec4( diffuse, opacity );
#include <clipping_planes_fragment>
#include <logdepthbuf_fragment>
#ifdef USE_MAP
	diffuseColor *= texture( map, vMapUv );
#endif
#ifdef USE_ALPHAMAP
	diffuseColor.a *= texture( alphaMap, gl_PointCoord ).g;
#endif
#include <color_fragment>
#include <alphatest_fragment>
	gl_FragColor = diffuseColor;
#include <tonemapping_fragment>
#include <colorspace_fragment>
#include <fog_fragment>
#include <premultiplied_alpha_fragment>
}
"#;
