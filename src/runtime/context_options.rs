use serde_derive::Serialize;
use wasm_bindgen::JsValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    Default,
    HighPerformance,
    LowPower,
}

impl Default for PowerPreference {
    fn default() -> Self {
        PowerPreference::Default
    }
}

/// Attributes of the WebGL2 context the bridge renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    alpha: bool,
    antialias: bool,
    depth: bool,
    stencil: bool,
    premultiplied_alpha: bool,
    preserve_drawing_buffer: bool,
    fail_if_major_performance_caveat: bool,
    power_preference: PowerPreference,
}

impl ContextOptions {
    pub fn begin() -> ContextOptionsBuilder {
        ContextOptionsBuilder {
            options: ContextOptions::default(),
        }
    }

    pub fn alpha(&self) -> bool {
        self.alpha
    }

    pub fn antialias(&self) -> bool {
        self.antialias
    }

    pub fn depth(&self) -> bool {
        self.depth
    }

    pub fn stencil(&self) -> bool {
        self.stencil
    }

    pub fn premultiplied_alpha(&self) -> bool {
        self.premultiplied_alpha
    }

    pub fn preserve_drawing_buffer(&self) -> bool {
        self.preserve_drawing_buffer
    }

    pub fn fail_if_major_performance_caveat(&self) -> bool {
        self.fail_if_major_performance_caveat
    }

    pub fn power_preference(&self) -> PowerPreference {
        self.power_preference
    }

    /// The context attribute dictionary passed to `getContext`.
    #[allow(deprecated)]
    pub(crate) fn to_js(&self) -> Result<JsValue, serde_json::Error> {
        JsValue::from_serde(&self.attributes())
    }

    fn attributes(&self) -> OptionsJson {
        OptionsJson {
            alpha: self.alpha,
            antialias: self.antialias,
            depth: self.depth,
            fail_if_major_performance_caveat: self.fail_if_major_performance_caveat,
            power_preference: self.power_preference,
            premultiplied_alpha: self.premultiplied_alpha,
            preserve_drawing_buffer: self.preserve_drawing_buffer,
            stencil: self.stencil,
        }
    }
}

impl Default for ContextOptions {
    /// An opaque, antialiased context with depth and stencil buffers whose drawing buffer is
    /// preserved between frames.
    fn default() -> Self {
        ContextOptions {
            alpha: false,
            antialias: true,
            depth: true,
            stencil: true,
            premultiplied_alpha: true,
            preserve_drawing_buffer: true,
            fail_if_major_performance_caveat: false,
            power_preference: PowerPreference::default(),
        }
    }
}

pub struct ContextOptionsBuilder {
    options: ContextOptions,
}

impl ContextOptionsBuilder {
    pub fn alpha(mut self, alpha: bool) -> Self {
        self.options.alpha = alpha;

        self
    }

    pub fn antialias(mut self, antialias: bool) -> Self {
        self.options.antialias = antialias;

        self
    }

    pub fn depth(mut self, depth: bool) -> Self {
        self.options.depth = depth;

        self
    }

    pub fn stencil(mut self, stencil: bool) -> Self {
        self.options.stencil = stencil;

        self
    }

    pub fn premultiplied_alpha(mut self, premultiplied_alpha: bool) -> Self {
        self.options.premultiplied_alpha = premultiplied_alpha;

        self
    }

    pub fn preserve_drawing_buffer(mut self, preserve_drawing_buffer: bool) -> Self {
        self.options.preserve_drawing_buffer = preserve_drawing_buffer;

        self
    }

    pub fn fail_if_major_performance_caveat(
        mut self,
        fail_if_major_performance_caveat: bool,
    ) -> Self {
        self.options.fail_if_major_performance_caveat = fail_if_major_performance_caveat;

        self
    }

    pub fn power_preference(mut self, power_preference: PowerPreference) -> Self {
        self.options.power_preference = power_preference;

        self
    }

    pub fn finish(self) -> ContextOptions {
        self.options
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OptionsJson {
    alpha: bool,
    antialias: bool,
    depth: bool,
    fail_if_major_performance_caveat: bool,
    power_preference: PowerPreference,
    premultiplied_alpha: bool,
    preserve_drawing_buffer: bool,
    stencil: bool,
}
