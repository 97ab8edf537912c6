//! Line-driven stand-in for the application core.
//!
//! Reads commands from stdin, turns them into intents for the bridge, and
//! prints incoming notifications. Session refresh and status are core-side
//! actions on the client itself, not intents.

use backend_bridge::{Intent, Notification, Record};
use std::sync::Arc;
use supabase_api::{OAuthProvider, SupabaseClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const HELP: &str = "\
commands:
  signin google|github   start a browser sign-in
  signout                terminate the session
  refresh                refresh the session token
  status                 show the signed-in user
  create <json>          create a channel, e.g. create {\"name\": \"news\"}
  load                   list channels
  help                   show this help
  quit                   exit";

/// A console command, parsed from one input line.
#[derive(Debug, PartialEq)]
enum Command {
    SignIn(OAuthProvider),
    SignOut,
    Refresh,
    Status,
    Create(Record),
    Load,
    Help,
    Quit,
}

/// Parse one input line into a command.
fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word {
        "signin" => match OAuthProvider::from_name(rest) {
            Some(provider) => Ok(Command::SignIn(provider)),
            None => Err(format!(
                "unknown provider '{}' (expected google or github)",
                rest
            )),
        },
        "signout" => Ok(Command::SignOut),
        "refresh" => Ok(Command::Refresh),
        "status" => Ok(Command::Status),
        "create" => {
            if rest.is_empty() {
                return Err(
                    "create requires a JSON object, e.g. create {\"name\": \"news\"}".to_string(),
                );
            }
            serde_json::from_str::<Record>(rest)
                .map(Command::Create)
                .map_err(|e| format!("invalid JSON object: {}", e))
        }
        "load" => Ok(Command::Load),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{}' (try 'help')", other)),
    }
}

/// The console core.
pub struct ConsoleCore {
    client: Arc<SupabaseClient>,
}

impl ConsoleCore {
    /// Create the core. It receives the application API key at
    /// construction; the bridge never reads it.
    pub fn new(api_key: Option<String>, client: Arc<SupabaseClient>) -> Self {
        debug!(api_key_present = api_key.is_some(), "Console core initialized");
        Self { client }
    }

    /// Run the console until `quit` or end of input.
    pub async fn run(
        self,
        intents: mpsc::Sender<Intent>,
        mut notifications: mpsc::Receiver<Notification>,
    ) -> anyhow::Result<()> {
        let printer = tokio::spawn(async move {
            while let Some(notification) = notifications.recv().await {
                print_notification(notification);
            }
        });

        println!("channeldir console - type 'help' for commands");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            match parse_command(&line) {
                Err(message) => println!("error: {}", message),
                Ok(Command::Help) => println!("{}", HELP),
                Ok(Command::Quit) => break,
                Ok(Command::Refresh) => {
                    if let Err(err) = self.client.refresh_session().await {
                        warn!(error = %err, "Session refresh failed");
                    }
                }
                Ok(Command::Status) => match self.client.current_session().await {
                    Some(session) => println!(
                        "signed in as {}{}",
                        session.user_id,
                        session
                            .email
                            .map(|email| format!(" ({})", email))
                            .unwrap_or_default()
                    ),
                    None => println!("signed out"),
                },
                Ok(Command::SignIn(provider)) => {
                    send(&intents, Intent::SignInWithOAuth { provider }).await?;
                }
                Ok(Command::SignOut) => send(&intents, Intent::SignOut).await?,
                Ok(Command::Create(fields)) => {
                    send(&intents, Intent::CreateChannel { fields }).await?;
                }
                Ok(Command::Load) => send(&intents, Intent::LoadChannels).await?,
            }
        }

        printer.abort();
        Ok(())
    }
}

async fn send(intents: &mpsc::Sender<Intent>, intent: Intent) -> anyhow::Result<()> {
    intents
        .send(intent)
        .await
        .map_err(|_| anyhow::anyhow!("bridge stopped"))
}

fn print_notification(notification: Notification) {
    match notification {
        Notification::UserSignedIn => println!("signed in"),
        Notification::UserSignedOut => println!("signed out"),
        Notification::ChannelsLoaded { records } => match records {
            Some(rows) => {
                println!("{} channel(s)", rows.len());
                for row in rows {
                    println!("  {}", serde_json::Value::Object(row));
                }
            }
            None => println!("no channel data"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(json: &str) -> Record {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parse_signin_providers() {
        assert_eq!(
            parse_command("signin google"),
            Ok(Command::SignIn(OAuthProvider::Google))
        );
        assert_eq!(
            parse_command("signin github"),
            Ok(Command::SignIn(OAuthProvider::Github))
        );
    }

    #[test]
    fn parse_signin_unknown_provider() {
        assert!(parse_command("signin gitlab").is_err());
        assert!(parse_command("signin").is_err());
    }

    #[test]
    fn parse_simple_commands() {
        assert_eq!(parse_command("signout"), Ok(Command::SignOut));
        assert_eq!(parse_command("refresh"), Ok(Command::Refresh));
        assert_eq!(parse_command("status"), Ok(Command::Status));
        assert_eq!(parse_command("load"), Ok(Command::Load));
        assert_eq!(parse_command("help"), Ok(Command::Help));
        assert_eq!(parse_command("quit"), Ok(Command::Quit));
        assert_eq!(parse_command("exit"), Ok(Command::Quit));
    }

    #[test]
    fn parse_create_with_payload() {
        assert_eq!(
            parse_command(r#"create {"name": "news"}"#),
            Ok(Command::Create(fields(r#"{"name": "news"}"#)))
        );
    }

    #[test]
    fn parse_create_requires_json_object() {
        assert!(parse_command("create").is_err());
        assert!(parse_command("create not-json").is_err());
        // A JSON array is not an object
        assert!(parse_command("create [1, 2]").is_err());
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(parse_command("  load  "), Ok(Command::Load));
        assert_eq!(
            parse_command("  signin   google "),
            Ok(Command::SignIn(OAuthProvider::Google))
        );
    }

    #[test]
    fn parse_unknown_command() {
        assert!(parse_command("reload").is_err());
        assert!(parse_command("").is_err());
    }
}
