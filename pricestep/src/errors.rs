use thiserror::Error;

/// Errors raised by the browser driver layer (selectors, waits, DevTools calls).
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Element is not visible: {0}")]
    ElementNotVisible(String),

    #[error("Element is not enabled: {0}")]
    ElementNotEnabled(String),

    #[error("Element bounds are not stable: {0}")]
    ElementNotStable(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Script evaluation failed: {0}")]
    ScriptError(String),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    /// The page's JavaScript context went away, usually because a new
    /// document replaced it. Retried by waits.
    #[error("Execution context lost: {0}")]
    ContextLost(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),
}

impl AutomationError {
    /// Errors a polling wait should retry until its deadline.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AutomationError::ScriptError(_) | AutomationError::ContextLost(_)
        )
    }
}

/// Failures of the pricing adapter, one variant per adapter contract.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("listing for SKU '{sku}' not found")]
    NotFound {
        sku: String,
        #[source]
        source: AutomationError,
    },

    #[error("could not {action}")]
    Interaction {
        action: String,
        #[source]
        source: AutomationError,
    },

    #[error("could not read settlement value: {0}")]
    Read(String),
}

impl AdapterError {
    pub fn interaction(action: impl Into<String>, source: AutomationError) -> Self {
        AdapterError::Interaction {
            action: action.into(),
            source,
        }
    }
}

/// Problems with the input spreadsheet, either for the whole file or a single row.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to open input '{path}': {reason}")]
    Open { path: String, reason: String },

    #[error("failed to parse CSV input")]
    Csv(#[from] csv::Error),

    #[error("required column '{0}' not found in header row")]
    MissingColumn(String),

    #[error("sheet is empty: {0}")]
    EmptySheet(String),

    #[error("row {row}: {reason}")]
    Row {
        row: usize,
        sku: String,
        reason: String,
    },
}

/// Why a single task ended in failure.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("settlement value did not advance after applying {applied:.2} (read back {observed:.2})")]
    Stalled { applied: f64, observed: f64 },
}

/// Fatal errors while establishing the browser session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no browser executable found (tried: {0})")]
    BrowserNotFound(String),

    #[error("failed to launch browser '{path}'")]
    Launch {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare profile directory '{path}'")]
    Profile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("DevTools port {port} is already served by {browser}; close it or pick another debug port")]
    PortInUse { port: u16, browser: String },

    #[error("browser exited before DevTools came up ({status}); is another instance using the same profile?")]
    BrowserExited { status: String },

    #[error("DevTools endpoint on port {port} did not come up: {reason}")]
    DevToolsUnavailable { port: u16, reason: String },

    #[error("browser exposes no page target")]
    NoPageTarget,

    #[error("failed to connect to page target: {0}")]
    Connect(String),
}

/// Invalid or unreadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Render an error with its whole `source()` chain, outermost first.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
