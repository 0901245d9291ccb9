use super::init_common_components;

/// Strategy for printing the session id of this installation.
///
/// The id is created and persisted on first use, exactly as a chat would.
#[derive(Debug, Clone, Copy)]
pub struct SessionStrategy;

impl super::CommandStrategy for SessionStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components()?;
        let session_id = common.identity.get_or_create_session_id()?;
        println!("{session_id}");
        Ok(())
    }
}
