#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("Use error: {0}")]
    UseError(String),
    #[error("Input error: {0}")]
    InputError(String),
    #[error("{0}")]
    Context(String),
}

impl CliError {
    pub(crate) fn use_error<S: ToString>(msg: S) -> Self {
        Self::UseError(msg.to_string())
    }

    pub(crate) fn input_error<S: ToString>(msg: S) -> Self {
        Self::InputError(msg.to_string())
    }

    pub(crate) fn context<S: ToString>(ctx: S) -> Self {
        Self::Context(ctx.to_string())
    }
}
