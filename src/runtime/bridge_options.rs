use log::LevelFilter;

use crate::logging::LoggingConfig;
use crate::runtime::context_options::ContextOptions;

/// Where the bridge finds its page elements and guest module, and how it sets up the context.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    canvas_id: String,
    module_url: String,
    equation_input_id: Option<String>,
    log_level: LevelFilter,
    context: ContextOptions,
}

impl BridgeOptions {
    pub fn begin() -> BridgeOptionsBuilder {
        BridgeOptionsBuilder {
            options: BridgeOptions::default(),
        }
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    pub fn module_url(&self) -> &str {
        &self.module_url
    }

    /// The id of the text input whose value is submitted to the guest on `Enter`, if any.
    pub fn equation_input_id(&self) -> Option<&str> {
        self.equation_input_id.as_deref()
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn context(&self) -> &ContextOptions {
        &self.context
    }

    pub(crate) fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level,
            ..LoggingConfig::default()
        }
    }
}

impl Default for BridgeOptions {
    fn default() -> Self {
        BridgeOptions {
            canvas_id: "webgl".to_string(),
            module_url: "main_web.wasm".to_string(),
            equation_input_id: Some("equation-input".to_string()),
            log_level: LevelFilter::Info,
            context: ContextOptions::default(),
        }
    }
}

pub struct BridgeOptionsBuilder {
    options: BridgeOptions,
}

impl BridgeOptionsBuilder {
    pub fn canvas_id<S>(mut self, canvas_id: S) -> Self
    where
        S: Into<String>,
    {
        self.options.canvas_id = canvas_id.into();

        self
    }

    pub fn module_url<S>(mut self, module_url: S) -> Self
    where
        S: Into<String>,
    {
        self.options.module_url = module_url.into();

        self
    }

    pub fn equation_input_id<S>(mut self, equation_input_id: S) -> Self
    where
        S: Into<String>,
    {
        self.options.equation_input_id = Some(equation_input_id.into());

        self
    }

    pub fn without_equation_input(mut self) -> Self {
        self.options.equation_input_id = None;

        self
    }

    pub fn log_level(mut self, log_level: LevelFilter) -> Self {
        self.options.log_level = log_level;

        self
    }

    pub fn context(mut self, context: ContextOptions) -> Self {
        self.options.context = context;

        self
    }

    pub fn finish(self) -> BridgeOptions {
        self.options
    }
}
