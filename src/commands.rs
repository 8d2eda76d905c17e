use anyhow::{Context, Result, bail};
use std::sync::Arc;

use crate::bridge::host::{HostContainer, HostLayout};
use crate::config::Config;
use crate::llm::GeminiClient;
use crate::session::{ConversationSession, Rejection, SubmitOutcome, TurnOutcome};

/// One question, one answer, no terminal UI
pub async fn ask(config: &Config, text: &str) -> Result<()> {
    let backend = GeminiClient::new(config).context("Widget is not operational")?;
    let mut session = ConversationSession::with_welcome(
        Arc::new(backend),
        config.widget.welcome_message.clone(),
    )
    .with_request_timeout(config.request_timeout());

    match session.submit(text) {
        SubmitOutcome::Accepted(_) => {}
        SubmitOutcome::Rejected(Rejection::BlankInput) => bail!("Nothing to ask: the question is blank"),
        SubmitOutcome::Rejected(Rejection::Busy) => bail!("A reply is already pending"),
    }

    match session.wait_for_completion().await {
        Some(TurnOutcome::Replied(_)) => {
            if let Some(reply) = session.transcript().last() {
                println!("🤖 {}", reply.content());
            }
            Ok(())
        }
        Some(TurnOutcome::Failed(message)) => bail!("{message}"),
        None => bail!("No reply was requested"),
    }
}

/// Print the host-page listener for the configured widget
pub fn snippet(config: &Config, iframe_id: &str) -> Result<()> {
    let container = HostContainer::new(
        config.widget.name.clone(),
        HostLayout::anchored(config.widget.anchor),
    );
    println!("{}", container.listener_script(iframe_id));
    Ok(())
}

pub fn init_config(config: &Config) -> Result<()> {
    let path = config.save()?;
    println!("📝 Configuration written to {}", path.display());
    if config.api_key().is_err() {
        println!("💡 Set api_key there, or export API_KEY / GEMINI_API_KEY.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_config_writes_loadable_file() {
        let home = std::env::temp_dir().join(format!("prevtech-home-{}", uuid::Uuid::new_v4()));
        let mut config = Config::default();
        config.home = home.clone();
        config.widget.name = "assistente".to_string();

        init_config(&config).unwrap();
        let loaded = Config::load_from(&home.join("config.toml")).unwrap();
        std::fs::remove_dir_all(&home).ok();

        assert_eq!(loaded.widget.name, "assistente");
        assert_eq!(loaded.request_timeout_secs, config.request_timeout_secs);
    }
}
