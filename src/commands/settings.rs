use crate::{
    cli::SetKeyArgs,
    core::{errors::AppResult, types::Provider},
    security::keyring,
};

pub fn set_key(args: SetKeyArgs) -> AppResult<()> {
    keyring::set_provider_key(Provider::Gemini, &args.api_key)?;
    tracing::info!("stored Gemini API key in the OS keyring");
    Ok(())
}
