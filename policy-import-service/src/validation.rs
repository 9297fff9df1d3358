//! Pure eligibility checks for review items. An empty error list means the
//! item may be committed. Messages are user-facing (shown inline in the
//! review UI), so they are written in the broker's language.

use chrono::NaiveDate;

use crate::models::PolicyImportItem;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}

/// Validate one import item; returns every problem found, not just the first.
pub fn validate_item(item: &PolicyImportItem) -> Vec<String> {
    let mut errors = Vec::new();

    if item.extracted.client_name.trim().is_empty() {
        errors.push("Nome do cliente é obrigatório".to_string());
    }
    if item.extracted.policy_number.trim().is_empty() {
        errors.push("Número da apólice é obrigatório".to_string());
    }
    if item.insurer_id.is_none() {
        errors.push("Seguradora não identificada".to_string());
    }
    if item.ramo_id.is_none() {
        errors.push("Ramo não identificado".to_string());
    }
    if item.producer_id.is_none() {
        errors.push("Produtor não selecionado".to_string());
    }

    match item.commission_rate {
        None => errors.push("Percentual de comissão não informado".to_string()),
        Some(rate) if !(0.0..=100.0).contains(&rate) => {
            errors.push("Percentual de comissão deve estar entre 0 e 100".to_string());
        }
        Some(_) => {}
    }

    let start = match item.extracted.start_date.as_deref() {
        None => {
            errors.push("Data de início de vigência é obrigatória".to_string());
            None
        }
        Some(raw) => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push(format!("Data de início de vigência inválida: {raw}"));
            }
            parsed
        }
    };
    let end = match item.extracted.end_date.as_deref() {
        None => {
            errors.push("Data de fim de vigência é obrigatória".to_string());
            None
        }
        Some(raw) => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push(format!("Data de fim de vigência inválida: {raw}"));
            }
            parsed
        }
    };
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            errors.push("Fim de vigência anterior ao início".to_string());
        }
    }

    match item.extracted.premio_liquido {
        None => errors.push("Prêmio líquido não informado".to_string()),
        Some(premium) if premium <= 0.0 => {
            errors.push("Prêmio líquido deve ser maior que zero".to_string());
        }
        Some(_) => {}
    }

    errors
}
