//! Structured field extraction over an LLM completion gateway.
//!
//! The gateway is asked for a single tool call whose arguments are an
//! array of policy objects. The tool-call contract is not trusted: the
//! returned JSON is coerced through typed structs and records missing the
//! required fields are dropped with a warning.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::AdapterError;
use crate::models::ExtractedPolicyData;

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an assistant for a Brazilian insurance brokerage.
You receive the OCR text of one or more insurance policy documents, each introduced by a
'=== <filename> ===' header. Extract every policy you find and register it via the
register_policies tool. Dates must be ISO (YYYY-MM-DD). Monetary values are plain numbers
in BRL. Copy the source filename from the section header of the page the policy came from.
Never invent data: leave optional fields out when the document does not show them."#;

/// Converts aggregated OCR text into structured policy records.
#[async_trait]
pub trait PolicyExtractor: Send + Sync {
    async fn extract_policies(
        &self,
        aggregated_text: &str,
    ) -> Result<Vec<ExtractedPolicyData>, AdapterError>;
}

pub struct ExtractionClient {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl ExtractionClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn tool_schema() -> Value {
        json!({
            "type": "function",
            "function": {
                "name": "register_policies",
                "description": "Register the insurance policies found in the documents",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "policies": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "client_name": { "type": "string" },
                                    "cpf_cnpj": { "type": "string" },
                                    "email": { "type": "string" },
                                    "phone": { "type": "string" },
                                    "address": { "type": "string" },
                                    "policy_number": { "type": "string" },
                                    "insurer_name": { "type": "string" },
                                    "ramo_name": { "type": "string" },
                                    "start_date": { "type": "string" },
                                    "end_date": { "type": "string" },
                                    "insured_asset": { "type": "string" },
                                    "premio_liquido": { "type": "number" },
                                    "premio_total": { "type": "number" },
                                    "source_file": { "type": "string" }
                                },
                                "required": [
                                    "client_name",
                                    "policy_number",
                                    "insurer_name",
                                    "ramo_name",
                                    "source_file"
                                ]
                            }
                        }
                    },
                    "required": ["policies"]
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    choices: Vec<GatewayChoice>,
}

#[derive(Debug, Deserialize)]
struct GatewayChoice {
    message: GatewayMessage,
}

#[derive(Debug, Deserialize)]
struct GatewayMessage {
    #[serde(default)]
    tool_calls: Vec<GatewayToolCall>,
}

#[derive(Debug, Deserialize)]
struct GatewayToolCall {
    function: GatewayFunctionCall,
}

#[derive(Debug, Deserialize)]
struct GatewayFunctionCall {
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ToolArguments {
    #[serde(default)]
    policies: Vec<RawPolicy>,
}

/// Loosely-typed record as returned by the model, before coercion.
#[derive(Debug, Deserialize)]
struct RawPolicy {
    client_name: Option<String>,
    cpf_cnpj: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    policy_number: Option<String>,
    insurer_name: Option<String>,
    ramo_name: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    insured_asset: Option<String>,
    premio_liquido: Option<f64>,
    premio_total: Option<f64>,
    source_file: Option<String>,
}

/// Coerce a raw model record into the typed shape; `None` when a required
/// field is missing or blank.
fn coerce_policy(raw: RawPolicy) -> Option<ExtractedPolicyData> {
    let required = |field: &Option<String>| -> Option<String> {
        field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Some(ExtractedPolicyData {
        client_name: required(&raw.client_name)?,
        policy_number: required(&raw.policy_number)?,
        insurer_name: required(&raw.insurer_name)?,
        ramo_name: required(&raw.ramo_name)?,
        source_file: required(&raw.source_file)?,
        cpf_cnpj: raw.cpf_cnpj,
        email: raw.email,
        phone: raw.phone,
        address: raw.address,
        start_date: raw.start_date,
        end_date: raw.end_date,
        insured_asset: raw.insured_asset,
        premio_liquido: raw.premio_liquido,
        premio_total: raw.premio_total,
    })
}

fn parse_tool_response(body: &str) -> Result<Vec<ExtractedPolicyData>, AdapterError> {
    let response: GatewayResponse = serde_json::from_str(body)
        .map_err(|e| AdapterError::Schema(format!("malformed gateway response: {e}")))?;

    let tool_call = response
        .choices
        .first()
        .and_then(|c| c.message.tool_calls.first())
        .ok_or_else(|| AdapterError::Schema("gateway returned no tool call".to_string()))?;

    let arguments: ToolArguments = serde_json::from_str(&tool_call.function.arguments)
        .map_err(|e| AdapterError::Schema(format!("malformed tool arguments: {e}")))?;

    let total = arguments.policies.len();
    let policies: Vec<ExtractedPolicyData> = arguments
        .policies
        .into_iter()
        .filter_map(coerce_policy)
        .collect();

    if policies.len() < total {
        warn!(
            dropped = total - policies.len(),
            "Dropped extracted records missing required fields"
        );
    }
    Ok(policies)
}

#[async_trait]
impl PolicyExtractor for ExtractionClient {
    async fn extract_policies(
        &self,
        aggregated_text: &str,
    ) -> Result<Vec<ExtractedPolicyData>, AdapterError> {
        info!(chars = aggregated_text.len(), "Requesting policy extraction");

        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": EXTRACTION_SYSTEM_PROMPT },
                { "role": "user", "content": aggregated_text }
            ],
            "tools": [Self::tool_schema()],
            "tool_choice": { "type": "function", "function": { "name": "register_policies" } }
        });

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        match status {
            429 => return Err(AdapterError::RateLimited),
            402 => return Err(AdapterError::OutOfCredits),
            s if !(200..300).contains(&s) => {
                return Err(AdapterError::Gateway {
                    status: s,
                    message: response.text().await.unwrap_or_default(),
                });
            }
            _ => {}
        }

        let body = response.text().await?;
        let policies = parse_tool_response(&body)?;
        info!(count = policies.len(), "Extraction returned policy records");
        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway_body(arguments: &Value) -> String {
        json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "function": {
                            "name": "register_policies",
                            "arguments": arguments.to_string()
                        }
                    }]
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn parses_valid_tool_call() {
        let body = gateway_body(&json!({
            "policies": [{
                "client_name": "Maria Souza",
                "policy_number": "AP-1",
                "insurer_name": "Porto Seguro",
                "ramo_name": "Auto",
                "source_file": "apolice.pdf",
                "premio_liquido": 2400.0
            }]
        }));

        let policies = parse_tool_response(&body).unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].client_name, "Maria Souza");
        assert_eq!(policies[0].premio_liquido, Some(2400.0));
        assert_eq!(policies[0].email, None);
    }

    #[test]
    fn drops_records_missing_required_fields() {
        let body = gateway_body(&json!({
            "policies": [
                {
                    "client_name": "Completa",
                    "policy_number": "AP-1",
                    "insurer_name": "Porto Seguro",
                    "ramo_name": "Auto",
                    "source_file": "a.pdf"
                },
                {
                    "client_name": "  ",
                    "policy_number": "AP-2",
                    "insurer_name": "Allianz",
                    "ramo_name": "Vida",
                    "source_file": "b.pdf"
                },
                {
                    "client_name": "Sem apólice",
                    "insurer_name": "Allianz",
                    "ramo_name": "Vida",
                    "source_file": "c.pdf"
                }
            ]
        }));

        let policies = parse_tool_response(&body).unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].client_name, "Completa");
    }

    #[test]
    fn missing_tool_call_is_a_schema_error() {
        let body = json!({ "choices": [{ "message": {} }] }).to_string();
        let err = parse_tool_response(&body).unwrap_err();
        assert!(matches!(err, AdapterError::Schema(_)));
    }

    #[test]
    fn malformed_arguments_are_a_schema_error() {
        let body = gateway_body(&json!("not an object"));
        // arguments string is `"not an object"` – valid JSON, wrong shape
        let err = parse_tool_response(&body).unwrap_err();
        assert!(matches!(err, AdapterError::Schema(_)));
    }
}
