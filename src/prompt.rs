//! Interactive credential prompt reading from the terminal.

use std::io::{self, BufRead, IsTerminal, Write};

use async_trait::async_trait;
use openrosa_core::{CredentialDecision, CredentialPrompt, CredentialRequest};
use tracing::warn;

/// Asks for a username and password on stderr/stdin.
///
/// Declines when stdin is not a terminal, so piped runs never block. The
/// password is echoed.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    /// Username offered when the store has none for the target.
    pub default_username: Option<String>,
}

#[async_trait]
impl CredentialPrompt for TerminalPrompt {
    async fn request_credentials(&self, request: &CredentialRequest) -> CredentialDecision {
        if !io::stdin().is_terminal() {
            warn!(target_url = %request.target_url, "authentication required but stdin is not a terminal");
            return CredentialDecision::Cancel;
        }

        let request = request.clone();
        let default_username = self.default_username.clone();
        let answer = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            ask(&mut input, &mut io::stderr(), &request, default_username.as_deref())
        })
        .await;

        match answer {
            Ok(Ok(decision)) => decision,
            Ok(Err(error)) => {
                warn!(error = %error, "failed reading credentials");
                CredentialDecision::Cancel
            }
            Err(error) => {
                warn!(error = %error, "credential prompt task failed");
                CredentialDecision::Cancel
            }
        }
    }
}

/// Runs the prompt dialogue. An empty username cancels.
fn ask(
    input: &mut impl BufRead,
    output: &mut impl Write,
    request: &CredentialRequest,
    default_username: Option<&str>,
) -> io::Result<CredentialDecision> {
    let suggested = request.prefill_username.as_deref().or(default_username);

    writeln!(
        output,
        "Server returned {} for {}. Enter credentials (empty username cancels).",
        request.status, request.target_url
    )?;
    match suggested {
        Some(name) => write!(output, "Username [{name}]: ")?,
        None => write!(output, "Username: ")?,
    }
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let username = match (line.trim(), suggested) {
        ("", Some(name)) => name.to_string(),
        ("", None) => return Ok(CredentialDecision::Cancel),
        (typed, _) => typed.to_string(),
    };

    write!(output, "Password: ")?;
    output.flush()?;
    line.clear();
    input.read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();

    Ok(CredentialDecision::Provide { username, password })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prefill: Option<&str>) -> CredentialRequest {
        CredentialRequest {
            target_url: "https://srv.example".to_string(),
            status: 401,
            overridden: false,
            prefill_username: prefill.map(str::to_string),
        }
    }

    #[test]
    fn test_ask_reads_username_and_password() {
        let mut input = io::Cursor::new("alice\ns3cret pass\n");
        let mut output = Vec::new();

        let decision = ask(&mut input, &mut output, &request(None), None).unwrap();

        assert_eq!(
            decision,
            CredentialDecision::Provide {
                username: "alice".to_string(),
                password: "s3cret pass".to_string(),
            }
        );
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("401"));
        assert!(shown.contains("https://srv.example"));
    }

    #[test]
    fn test_ask_empty_username_uses_prefill() {
        let mut input = io::Cursor::new("\npw\n");
        let mut output = Vec::new();

        let decision = ask(&mut input, &mut output, &request(Some("bob")), Some("ignored")).unwrap();

        assert!(matches!(
            decision,
            CredentialDecision::Provide { ref username, .. } if username == "bob"
        ));
        assert!(String::from_utf8(output).unwrap().contains("Username [bob]"));
    }

    #[test]
    fn test_ask_empty_username_without_default_cancels() {
        let mut input = io::Cursor::new("\n");
        let mut output = Vec::new();

        let decision = ask(&mut input, &mut output, &request(None), None).unwrap();

        assert_eq!(decision, CredentialDecision::Cancel);
    }
}
