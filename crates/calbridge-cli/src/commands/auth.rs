//! Auth command - obtains a refresh token through the OAuth consent flow.

use std::time::Duration;

use calbridge_gcal::{CALENDAR_SCOPE, OAuthClient};

use crate::error::{ClientError, ClientResult};

/// Loopback ports tried for the OAuth redirect listener.
const CALLBACK_PORT_RANGE: (u16, u16) = (8400, 8420);

/// Runs the browser consent flow and prints the resulting refresh token.
pub async fn run(client_id: String, client_secret: String) -> ClientResult<()> {
    println!("Starting Google Calendar authorization...");
    println!("A browser window will open for you to authorize access.");
    println!("If the browser doesn't open, check the terminal for a URL to copy.");
    println!();

    let oauth = OAuthClient::new(client_id, client_secret, Duration::from_secs(30))?;
    let tokens = oauth
        .authorize(&[CALENDAR_SCOPE.to_string()], CALLBACK_PORT_RANGE)
        .await?;

    let Some(refresh_token) = tokens.refresh_token else {
        return Err(ClientError::Auth(
            "no refresh token in the authorization response; revoke the app's access at \
             https://myaccount.google.com/permissions and retry"
                .into(),
        ));
    };

    println!("Authorization complete. Add this to your environment:");
    println!();
    println!("  GOOGLE_REFRESH_TOKEN=\"{}\"", refresh_token);
    println!();
    println!("together with GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET.");
    Ok(())
}
