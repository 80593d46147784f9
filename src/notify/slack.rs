use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};
use tracing::warn;

use crate::config::{CardConfig, SlackConfig};
use crate::models::{TapMismatch, Transaction};
use crate::notify::Notifier;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

struct SlackChannel {
    http: Client,
    token: String,
    channel: String,
}

/// Sends one Slack message per new transaction and per new mismatch.
///
/// Constructed from optional credentials: without them every call is a
/// no-op, mirroring the configuration surface where missing Slack settings
/// disable notification but never ingestion.
pub struct SlackNotifier {
    target: Option<SlackChannel>,
}

impl SlackNotifier {
    pub fn from_config(slack: Option<&SlackConfig>, timeout: Duration) -> Self {
        let target = slack.and_then(|config| {
            match Client::builder().timeout(timeout).build() {
                Ok(http) => Some(SlackChannel {
                    http,
                    token: config.token.clone(),
                    channel: config.channel.clone(),
                }),
                Err(error) => {
                    warn!("Could not build Slack HTTP client, notifications disabled: {error}");
                    None
                }
            }
        });

        Self { target }
    }

    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    async fn post_message(&self, fallback_text: &str, blocks: Value) {
        let Some(target) = &self.target else {
            return;
        };

        let payload = json!({
            "channel": target.channel,
            "icon_emoji": ":robot_face:",
            "text": fallback_text,
            "blocks": blocks,
        });

        let response = target
            .http
            .post(POST_MESSAGE_URL)
            .bearer_auth(&target.token)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) => match response.json::<Value>().await {
                Ok(body) if body.get("ok").and_then(Value::as_bool) == Some(true) => {}
                Ok(body) => {
                    let error = body
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    warn!("Slack rejected notification: {error}");
                }
                Err(error) => warn!("Slack response could not be decoded: {error}"),
            },
            Err(error) => warn!("Slack notification failed: {error}"),
        }
    }

    fn emoji_for(description: Option<&str>) -> &'static str {
        let Some(description) = description else {
            return ":credit_card:";
        };

        if description.contains("Bus") {
            ":bus:"
        } else if description.contains("Train") {
            ":train:"
        } else if description.contains("Ferry") {
            ":ferry:"
        } else {
            ":credit_card:"
        }
    }

    fn card_display(card: &CardConfig) -> String {
        match &card.name {
            Some(name) => format!("{name}'s Card"),
            None => "HOP Card".to_string(),
        }
    }

    fn amount_display(transaction: &Transaction) -> String {
        if let Some(display) = &transaction.value_display {
            return display.clone();
        }
        match transaction.value {
            Some(value) => format!("${value:.2}"),
            None => "N/A".to_string(),
        }
    }

    fn transaction_blocks(card: &CardConfig, transaction: &Transaction) -> Value {
        let emoji = Self::emoji_for(transaction.description.as_deref());
        let missing = "N/A";

        json!([
            {
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": format!("{emoji} New HOP Transaction"),
                    "emoji": true,
                },
            },
            {
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*Card:*\n{}", Self::card_display(card)) },
                    { "type": "mrkdwn", "text": format!("*Date/Time:*\n{}", transaction.transactiondatetime.as_deref().unwrap_or(missing)) },
                ],
            },
            {
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*Description:*\n{}", transaction.description.as_deref().unwrap_or(missing)) },
                    { "type": "mrkdwn", "text": format!("*Location:*\n{}", transaction.location.as_deref().unwrap_or(missing)) },
                ],
            },
            {
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*Amount:*\n{}", Self::amount_display(transaction)) },
                    { "type": "mrkdwn", "text": format!("*Balance:*\n{}", transaction.hop_balance_display.as_deref().unwrap_or(missing)) },
                ],
            },
            {
                "type": "context",
                "elements": [
                    {
                        "type": "mrkdwn",
                        "text": format!(
                            "Transaction ID: {} | Type: {}",
                            transaction.cardtransactionid,
                            transaction.transaction_type_description.as_deref().unwrap_or(missing)
                        ),
                    }
                ],
            },
            { "type": "divider" },
        ])
    }

    fn mismatch_blocks(card: &CardConfig, mismatch: &TapMismatch) -> Value {
        let missing = "N/A";

        json!([
            {
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": ":warning: Possible Tap Mismatch",
                    "emoji": true,
                },
            },
            {
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*Card:*\n{}", Self::card_display(card)) },
                    { "type": "mrkdwn", "text": format!("*Date/Time:*\n{}", mismatch.occurred_at.as_deref().unwrap_or(missing)) },
                ],
            },
            {
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*Location:*\n{}", mismatch.location.as_deref().unwrap_or(missing)) },
                    { "type": "mrkdwn", "text": format!("*Pattern:*\n{}", mismatch.mismatch_type.as_str()) },
                ],
            },
            {
                "type": "context",
                "elements": [
                    {
                        "type": "mrkdwn",
                        "text": format!(
                            "Transaction ID: {} | Previous: {}",
                            mismatch.transaction_id, mismatch.previous_transaction_id
                        ),
                    }
                ],
            },
            { "type": "divider" },
        ])
    }
}

impl Notifier for SlackNotifier {
    async fn notify(
        &self,
        card: &CardConfig,
        new_transactions: &[Transaction],
        new_mismatches: &[TapMismatch],
    ) {
        if self.target.is_none() {
            return;
        }

        for transaction in new_transactions {
            let fallback = format!(
                "New HOP transaction: {} at {}",
                transaction.description.as_deref().unwrap_or("unknown"),
                transaction.location.as_deref().unwrap_or("unknown"),
            );
            self.post_message(&fallback, Self::transaction_blocks(card, transaction))
                .await;
        }

        for mismatch in new_mismatches {
            let fallback = format!(
                "Possible tap mismatch on {}: transaction {} followed entry {} without an exit",
                Self::card_display(card),
                mismatch.transaction_id,
                mismatch.previous_transaction_id,
            );
            self.post_message(&fallback, Self::mismatch_blocks(card, mismatch))
                .await;
        }
    }
}
