use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("tool '{tool}' is not installed")]
    ToolMissing { tool: String },

    #[error("failed to spawn '{tool}': {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    #[error("tool '{tool}' exited with unexpected code {code:?}")]
    UnexpectedExit { tool: String, code: Option<i32> },

    #[error("parser setup failed: {message}")]
    Parser { message: String },
}

impl PluginError {
    pub fn tool_missing(tool: impl Into<String>) -> Self {
        Self::ToolMissing { tool: tool.into() }
    }

    pub fn spawn(tool: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    pub fn unexpected_exit(tool: impl Into<String>, code: Option<i32>) -> Self {
        Self::UnexpectedExit {
            tool: tool.into(),
            code,
        }
    }

    pub fn parser(message: impl Into<String>) -> Self {
        Self::Parser {
            message: message.into(),
        }
    }
}
