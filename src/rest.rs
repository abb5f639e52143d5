//! REST boundary for originating a call.
//!
//! The response only acknowledges the request; every status change after
//! submission arrives over the Control Channel.

use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct OutboundCallResponse {
    #[serde(rename = "callConnectionId")]
    pub call_connection_id: Option<String>,
    #[serde(rename = "callId")]
    pub call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: Option<String>,
}

pub async fn initiate_call(
    client: &reqwest::Client,
    api_base: &str,
    phone_number: &str,
    bot_id: &str,
) -> anyhow::Result<OutboundCallResponse> {
    let url = format!("{}/api/outboundCall", api_base.trim_end_matches('/'));
    let body = json!({
        "phoneNumber": phone_number,
        "botId": bot_id,
    });

    let response = client.post(&url).json(&body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let detail = response
            .json::<ApiError>()
            .await
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| format!("HTTP {}", status));
        anyhow::bail!("outbound call rejected: {}", detail);
    }

    Ok(response.json::<OutboundCallResponse>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_with_either_id_field() {
        let json = r#"{"callConnectionId":"cc1","callId":"guid1"}"#;
        let parsed: OutboundCallResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.call_connection_id.as_deref(), Some("cc1"));
        assert_eq!(parsed.call_id.as_deref(), Some("guid1"));

        let parsed: OutboundCallResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.call_connection_id.is_none());
    }
}
