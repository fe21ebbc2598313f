use crate::Result;
use crate::callbacks::Callback;
use crate::llm::Message;
use async_trait::async_trait;
use std::io::Write;

/// Appends each new message in the history to a markdown transcript.
pub struct MessageLogger<W: Write + Send> {
    last_hashes: Vec<u64>,
    writer: W,
    step: u32,
}

impl<W: Write + Send> MessageLogger<W> {
    pub fn new(name: &str, mut writer: W) -> Result<Box<Self>> {
        write!(writer, "## {}\n\n", name)?;

        Ok(Box::new(Self {
            last_hashes: Vec::new(),
            writer,
            step: 0,
        }))
    }

    fn display_messages(&mut self, messages: &[Message]) -> Result<()> {
        write!(self.writer, "### Step {}\n\n", self.step)?;

        messages
            .iter()
            .try_for_each(|m| write!(self.writer, "{}", m))?;

        write!(self.writer, "---\n")?;

        Ok(())
    }

    fn display_history_cleared(&mut self) -> Result<()> {
        write!(self.writer, "## [HISTORY CLEARED]\n\n")?;
        Ok(())
    }

    fn prefix_match_len(&self, new_hashes: &[u64]) -> usize {
        new_hashes
            .iter()
            .zip(self.last_hashes.iter())
            .filter(|&(a, b)| *a == *b)
            .count()
    }
}

#[async_trait]
impl<W: Write + Send> Callback for MessageLogger<W> {
    async fn call(&mut self, messages: Vec<Message>) -> Result<Vec<Message>> {
        let new_hashes = messages.iter().map(Message::digest).collect::<Vec<_>>();

        if new_hashes.len() < self.last_hashes.len()
            || self.prefix_match_len(&new_hashes) != self.last_hashes.len()
        {
            self.display_history_cleared()?;
            self.display_messages(&messages)?;
        } else {
            self.display_messages(&messages[self.last_hashes.len()..])?;
        }

        self.writer.flush()?;

        self.step += 1;
        self.last_hashes = new_hashes;

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logs_only_new_messages() -> Result<()> {
        let mut out = Vec::new();
        {
            let mut logger = MessageLogger::new("basic_info: Hubble", &mut out)?;

            let history = vec![Message::User("find Hubble".to_string())];
            let history = logger.call(history).await?;

            let mut history = history;
            history.push(Message::Assistant("done".to_string(), vec![]));
            logger.call(history).await?;
        }

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("## basic_info: Hubble"));
        assert!(text.contains("### Step 0"));
        assert!(text.contains("### Step 1"));
        // the user message is only written once
        assert_eq!(text.matches("find Hubble").count(), 1);
        assert!(!text.contains("[HISTORY CLEARED]"));
        Ok(())
    }

    #[tokio::test]
    async fn test_detects_history_rewrite() -> Result<()> {
        let mut out = Vec::new();
        {
            let mut logger = MessageLogger::new("log", &mut out)?;

            logger
                .call(vec![
                    Message::User("a".to_string()),
                    Message::User("b".to_string()),
                ])
                .await?;

            logger.call(vec![Message::User("c".to_string())]).await?;
        }

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[HISTORY CLEARED]"));
        Ok(())
    }
}
