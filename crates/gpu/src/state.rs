use crate::device::GraphicsDevice;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one pipeline-state value.
///
/// Clones and every mutation get a fresh id, so an id names exactly one
/// configuration for as long as it is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(u64);

impl StateId {
    fn next() -> Self {
        Self(NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CullFace {
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthFunc {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Per-channel color write enables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ColorMask {
    pub const ALL: Self = Self {
        r: true,
        g: true,
        b: true,
        a: true,
    };
    pub const NONE: Self = Self {
        r: false,
        g: false,
        b: false,
        a: false,
    };

    pub fn from_array([r, g, b, a]: [bool; 4]) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Remembers which pipeline state was last pushed to the device.
///
/// Owned by a renderer session. Call [`StateCache::invalidate`] whenever
/// something else may have touched the device toggles.
#[derive(Debug, Default)]
pub struct StateCache {
    current: Option<StateId>,
    applied: u64,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<StateId> {
        self.current
    }

    /// How many times a state was actually pushed to the device.
    pub fn applied_count(&self) -> u64 {
        self.applied
    }

    pub fn invalidate(&mut self) {
        self.current = None;
    }
}

/// Rasterizer, depth and blend configuration for a draw.
#[derive(Debug)]
pub struct PipelineState {
    id: StateId,
    face_culling: bool,
    cull_face: CullFace,
    depth_test: bool,
    depth_func: DepthFunc,
    depth_write: bool,
    blending: bool,
    blend_src: BlendFactor,
    blend_dst: BlendFactor,
    color_mask: ColorMask,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            id: StateId::next(),
            face_culling: true,
            cull_face: CullFace::Back,
            depth_test: true,
            depth_func: DepthFunc::Less,
            depth_write: true,
            blending: false,
            blend_src: BlendFactor::SrcAlpha,
            blend_dst: BlendFactor::OneMinusSrcAlpha,
            color_mask: ColorMask::ALL,
        }
    }
}

impl Clone for PipelineState {
    fn clone(&self) -> Self {
        Self {
            id: StateId::next(),
            ..*self
        }
    }
}

impl PartialEq for PipelineState {
    fn eq(&self, other: &Self) -> bool {
        self.face_culling == other.face_culling
            && self.cull_face == other.cull_face
            && self.depth_test == other.depth_test
            && self.depth_func == other.depth_func
            && self.depth_write == other.depth_write
            && self.blending == other.blending
            && self.blend_src == other.blend_src
            && self.blend_dst == other.blend_dst
            && self.color_mask == other.color_mask
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard alpha blending with depth writes off.
    pub fn transparent() -> Self {
        let mut state = Self::default();
        state.set_blending(true).set_depth_write(false);
        state
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn face_culling(&self) -> bool {
        self.face_culling
    }

    pub fn cull_face(&self) -> CullFace {
        self.cull_face
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn depth_func(&self) -> DepthFunc {
        self.depth_func
    }

    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    pub fn blending(&self) -> bool {
        self.blending
    }

    pub fn blend_factors(&self) -> (BlendFactor, BlendFactor) {
        (self.blend_src, self.blend_dst)
    }

    pub fn color_mask(&self) -> ColorMask {
        self.color_mask
    }

    fn touch(&mut self) -> &mut Self {
        self.id = StateId::next();
        self
    }

    pub fn set_face_culling(&mut self, enabled: bool) -> &mut Self {
        self.face_culling = enabled;
        self.touch()
    }

    pub fn set_cull_face(&mut self, face: CullFace) -> &mut Self {
        self.cull_face = face;
        self.touch()
    }

    pub fn set_depth_test(&mut self, enabled: bool) -> &mut Self {
        self.depth_test = enabled;
        self.touch()
    }

    pub fn set_depth_func(&mut self, func: DepthFunc) -> &mut Self {
        self.depth_func = func;
        self.touch()
    }

    pub fn set_depth_write(&mut self, enabled: bool) -> &mut Self {
        self.depth_write = enabled;
        self.touch()
    }

    pub fn set_blending(&mut self, enabled: bool) -> &mut Self {
        self.blending = enabled;
        self.touch()
    }

    pub fn set_blend_factors(&mut self, src: BlendFactor, dst: BlendFactor) -> &mut Self {
        self.blend_src = src;
        self.blend_dst = dst;
        self.touch()
    }

    pub fn set_color_mask(&mut self, mask: ColorMask) -> &mut Self {
        self.color_mask = mask;
        self.touch()
    }

    /// Push this state to the device unless it is the one last applied.
    ///
    /// When it is pushed, every toggle is issued regardless of what the
    /// device currently holds. Returns whether anything was issued.
    pub fn apply(&self, cache: &mut StateCache, device: &mut dyn GraphicsDevice) -> bool {
        if cache.current == Some(self.id) {
            return false;
        }
        device.set_face_culling(self.face_culling, self.cull_face);
        device.set_depth_test(self.depth_test, self.depth_func);
        device.set_depth_write(self.depth_write);
        device.set_blending(self.blending, self.blend_src, self.blend_dst);
        device.set_color_mask(self.color_mask);
        cache.current = Some(self.id);
        cache.applied += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingDevice;

    #[test]
    fn defaults_match_opaque_geometry() {
        let state = PipelineState::default();
        assert!(state.face_culling());
        assert_eq!(state.cull_face(), CullFace::Back);
        assert!(state.depth_test());
        assert_eq!(state.depth_func(), DepthFunc::Less);
        assert!(state.depth_write());
        assert!(!state.blending());
        assert_eq!(
            state.blend_factors(),
            (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha)
        );
        assert_eq!(state.color_mask(), ColorMask::ALL);
    }

    #[test]
    fn same_state_applied_twice_issues_calls_once() {
        let mut device = RecordingDevice::new();
        let mut cache = StateCache::new();
        let state = PipelineState::default();

        assert!(state.apply(&mut cache, &mut device));
        assert!(!state.apply(&mut cache, &mut device));
        assert_eq!(device.state_changes(), 5);
        assert_eq!(cache.applied_count(), 1);
    }

    #[test]
    fn identical_clones_are_applied_separately() {
        let mut device = RecordingDevice::new();
        let mut cache = StateCache::new();
        let a = PipelineState::default();
        let b = a.clone();

        assert_eq!(a, b);
        assert_ne!(a.id(), b.id());
        a.apply(&mut cache, &mut device);
        b.apply(&mut cache, &mut device);
        assert_eq!(device.state_changes(), 10);
    }

    #[test]
    fn mutation_renews_identity() {
        let mut device = RecordingDevice::new();
        let mut cache = StateCache::new();
        let mut state = PipelineState::default();
        state.apply(&mut cache, &mut device);

        let before = state.id();
        state.set_blending(true);
        assert_ne!(state.id(), before);
        assert!(state.apply(&mut cache, &mut device));
        assert_eq!(device.state_changes(), 10);
    }

    #[test]
    fn invalidate_forces_reapply() {
        let mut device = RecordingDevice::new();
        let mut cache = StateCache::new();
        let state = PipelineState::default();
        state.apply(&mut cache, &mut device);
        cache.invalidate();
        assert!(state.apply(&mut cache, &mut device));
    }

    #[test]
    fn transparent_preset_blends_without_depth_writes() {
        let state = PipelineState::transparent();
        assert!(state.blending());
        assert!(!state.depth_write());
        assert!(state.depth_test());
    }

    #[test]
    fn color_mask_from_array() {
        let mask = ColorMask::from_array([true, false, true, false]);
        assert!(mask.r && !mask.g && mask.b && !mask.a);
        assert_eq!(ColorMask::from_array([false; 4]), ColorMask::NONE);
    }
}
