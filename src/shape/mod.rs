//! # Document Shape Heuristic
//!
//! Decides which layout archetype a document follows and whether its
//! authored content already carries a formal header (addressee, institution,
//! subject) and footer (closing phrase, date line, signature). Whatever is
//! missing gets synthesized here as markup for the layout engine.
//!
//! This is keyword matching over the merged text. False positives and
//! negatives are possible; every list it matches against lives in
//! [`ShapeRules`] so a deployment can tune it.

use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::Serialize;

use crate::config::ShapeRules;
use crate::layout::FlowItem;
use crate::markup::escape_html;
use crate::model::{LayoutType, UserData};
use crate::template::Template;

/// Space between the synthesized header and the body, in mm.
const HEADER_GAP: f64 = 6.0;
/// Space above the synthesized footer, in mm.
const FOOTER_GAP: f64 = 8.0;
/// Space left for the handwritten signature, in mm.
const SIGNATURE_GAP: f64 = 15.0;

const BLANK_DATE: &str = "____ de ______________ de ______";

const MONTHS_PT: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// The outcome of classifying one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeDecision {
    pub layout_type: LayoutType,
    pub has_formal_header: bool,
    pub has_formal_footer: bool,
    pub should_auto_add_header: bool,
    pub should_auto_add_footer: bool,
}

/// Pick the layout archetype: the explicit hint, else the first rule whose
/// keyword occurs in the title, else the default.
pub fn infer_layout_type(title: &str, explicit: Option<LayoutType>, rules: &ShapeRules) -> LayoutType {
    if let Some(layout) = explicit {
        return layout;
    }
    let title = title.to_lowercase();
    rules
        .layout_keywords
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| title.contains(&k.to_lowercase())))
        .map(|rule| rule.layout)
        .unwrap_or(rules.default_layout)
}

/// Everything [`classify`] looks at.
pub struct ShapeInput<'a> {
    pub template: &'a Template,
    /// Merged body as plain text.
    pub plain_text: &'a str,
    pub title: &'a str,
    pub data: &'a UserData,
    pub explicit: Option<LayoutType>,
}

pub fn classify(input: &ShapeInput<'_>, rules: &ShapeRules) -> ShapeDecision {
    let layout_type = infer_layout_type(input.title, input.explicit, rules);
    let has_formal_header = detect_header(input, rules);
    let has_formal_footer = detect_footer(input, rules);
    let has_any_placeholders = input.template.has_placeholders();

    let decision = ShapeDecision {
        layout_type,
        has_formal_header,
        has_formal_footer,
        should_auto_add_header: !has_formal_header && has_any_placeholders,
        should_auto_add_footer: !has_formal_footer && has_any_placeholders,
    };
    debug!("document shape: {decision:?}");
    decision
}

fn detect_header(input: &ShapeInput<'_>, rules: &ShapeRules) -> bool {
    if rules
        .header_placeholders
        .iter()
        .any(|key| input.template.references(key))
    {
        return true;
    }

    let head = first_chars(input.plain_text, rules.header_scan_chars).to_lowercase();
    if rules
        .header_keywords
        .iter()
        .any(|k| head.contains(&k.to_lowercase()))
    {
        return true;
    }

    let title = input.title.trim().to_uppercase();
    !title.is_empty()
        && first_chars(input.plain_text, rules.title_scan_chars)
            .to_uppercase()
            .contains(&title)
}

fn detect_footer(input: &ShapeInput<'_>, rules: &ShapeRules) -> bool {
    let lower = input.plain_text.to_lowercase();
    if rules
        .footer_phrases
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
    {
        return true;
    }

    if rules
        .footer_placeholders
        .iter()
        .any(|key| input.template.references(key))
    {
        return true;
    }

    match input.data.non_empty(&rules.name_field) {
        Some(name) => last_chars(input.plain_text, rules.footer_scan_chars)
            .to_uppercase()
            .contains(&name.to_uppercase()),
        None => false,
    }
}

fn first_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

fn last_chars(text: &str, n: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(n)).collect()
}

fn first_non_empty(data: &UserData, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|k| data.non_empty(k))
}

fn paragraph(align: &str, inner: String) -> FlowItem {
    FlowItem::Markup(format!("<p class=\"ql-align-{align}\">{inner}</p>"))
}

/// Synthesized header sections, empty unless the decision asks for one.
pub fn header_section(
    decision: &ShapeDecision,
    title: &str,
    data: &UserData,
    rules: &ShapeRules,
) -> Vec<FlowItem> {
    if !decision.should_auto_add_header {
        return Vec::new();
    }

    let mut items = Vec::new();
    match decision.layout_type {
        LayoutType::Declaration => {
            let title = title.trim();
            if !title.is_empty() {
                items.push(paragraph(
                    "center",
                    format!("<strong><u>{}</u></strong>", escape_html(&title.to_uppercase())),
                ));
            }
        }
        LayoutType::Official | LayoutType::Letter => {
            if let Some(addressee) = first_non_empty(data, &rules.addressee_fields) {
                items.push(paragraph("left", format!("<strong>{}</strong>", escape_html(&addressee))));
            }
            if let Some(institution) = data.non_empty(&rules.institution_field) {
                items.push(paragraph("left", format!("<strong>{}</strong>", escape_html(&institution))));
            }
            if let Some(subject) = data.non_empty(&rules.subject_field) {
                items.push(paragraph(
                    "left",
                    format!(
                        "<strong><u>{}{}</u></strong>",
                        escape_html(&rules.subject_prefix),
                        escape_html(&subject)
                    ),
                ));
            }
            if let Some(location) = first_non_empty(data, &rules.location_fields) {
                items.push(paragraph("right", format!("<u>{}</u>", escape_html(&location))));
            }
        }
    }

    if !items.is_empty() {
        items.push(FlowItem::Gap(HEADER_GAP));
    }
    items
}

/// The synthesized signature block, empty unless the decision asks for one.
pub fn footer_section(
    decision: &ShapeDecision,
    data: &UserData,
    issued_on: Option<NaiveDate>,
    rules: &ShapeRules,
) -> Vec<FlowItem> {
    if !decision.should_auto_add_footer {
        return Vec::new();
    }

    let mut items = vec![FlowItem::Gap(FOOTER_GAP)];

    if decision.layout_type != LayoutType::Declaration {
        items.push(paragraph("center", escape_html(&rules.closing_phrase)));
    }

    let date = data
        .non_empty(&rules.date_field)
        .or_else(|| issued_on.map(format_long_date))
        .unwrap_or_else(|| BLANK_DATE.to_string());
    let date_line = match data.non_empty(&rules.city_field) {
        Some(city) => format!("{city}, aos {date}."),
        None => format!("Aos {date}."),
    };
    items.push(paragraph("center", escape_html(&date_line)));
    items.push(FlowItem::Gap(SIGNATURE_GAP));

    if let Some(name) = data.non_empty(&rules.name_field) {
        items.push(paragraph(
            "center",
            format!("<strong>{}</strong>", escape_html(&name.to_uppercase())),
        ));
    }
    items.push(FlowItem::Rule {
        width: rules.signature_rule_width,
    });

    let label = match decision.layout_type {
        LayoutType::Declaration => &rules.declarant_label,
        LayoutType::Official | LayoutType::Letter => &rules.applicant_label,
    };
    items.push(paragraph("center", format!("<em>{}</em>", escape_html(label))));
    items
}

/// Portuguese long-form date: "17 de outubro de 2026".
pub fn format_long_date(date: NaiveDate) -> String {
    let month = MONTHS_PT[(date.month0() as usize).min(MONTHS_PT.len() - 1)];
    format!("{} de {} de {}", date.day(), month, date.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> ShapeRules {
        ShapeRules::default()
    }

    fn data(v: serde_json::Value) -> UserData {
        UserData::try_from(v).unwrap()
    }

    fn decide(template: &str, plain: &str, title: &str, d: &UserData) -> ShapeDecision {
        let t = Template::parse(template, true).unwrap();
        classify(
            &ShapeInput {
                template: &t,
                plain_text: plain,
                title,
                data: d,
                explicit: None,
            },
            &rules(),
        )
    }

    fn markup(items: &[FlowItem]) -> String {
        items
            .iter()
            .filter_map(|i| match i {
                FlowItem::Markup(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn layout_inference_from_title() {
        let r = rules();
        assert_eq!(infer_layout_type("Requerimento de DUAT", None, &r), LayoutType::Official);
        assert_eq!(infer_layout_type("Declaração de Residência", None, &r), LayoutType::Declaration);
        assert_eq!(infer_layout_type("DECLARAÇÃO DE HONRA", None, &r), LayoutType::Declaration);
        assert_eq!(infer_layout_type("Carta de Candidatura", None, &r), LayoutType::Letter);
        assert_eq!(infer_layout_type("Procuração", None, &r), LayoutType::Official);
        assert_eq!(
            infer_layout_type("Requerimento", Some(LayoutType::Letter), &r),
            LayoutType::Letter
        );
    }

    #[test]
    fn bare_template_gets_both_sections() {
        let d = data(json!({"full_name": "Ana Paulo"}));
        // The name sits outside the closing window.
        let plain = format!("Eu, Ana Paulo, venho requerer {}", "o seguinte ".repeat(40));
        let decision = decide("<p>Eu, {{full_name}}, venho requerer.</p>", &plain, "Requerimento", &d);
        assert!(!decision.has_formal_header);
        assert!(!decision.has_formal_footer);
        assert!(decision.should_auto_add_header);
        assert!(decision.should_auto_add_footer);
    }

    #[test]
    fn addressing_placeholder_means_formal_header() {
        let d = UserData::new();
        let decision = decide("<p>{{target_authority}}</p><p>texto</p>", "texto", "x", &d);
        assert!(decision.has_formal_header);
        assert!(!decision.should_auto_add_header);
    }

    #[test]
    fn keyword_in_opening_text_means_formal_header() {
        let d = UserData::new();
        let decision = decide("<p>Exmo. Senhor {{x}}</p>", "Exmo. Senhor Director", "x", &d);
        assert!(decision.has_formal_header);
    }

    #[test]
    fn title_in_opening_text_means_formal_header() {
        let d = UserData::new();
        let decision = decide("{{a}}", "DECLARAÇÃO DE RESIDÊNCIA\nEu...", "Declaração de Residência", &d);
        assert!(decision.has_formal_header);
    }

    #[test]
    fn closing_phrase_means_formal_footer() {
        let d = UserData::new();
        let decision = decide("{{a}}", "texto. Pede Deferimento.", "x", &d);
        assert!(decision.has_formal_footer);
        assert!(!decision.should_auto_add_footer);
    }

    #[test]
    fn name_at_end_means_formal_footer() {
        let d = data(json!({"full_name": "Ana Paulo"}));
        let decision = decide("{{full_name}}", "corpo do texto\nANA PAULO", "x", &d);
        assert!(decision.has_formal_footer);
    }

    #[test]
    fn no_placeholders_means_no_decoration() {
        let d = UserData::new();
        let decision = decide("<p>texto fixo</p>", "texto fixo", "x", &d);
        assert!(!decision.should_auto_add_header);
        assert!(!decision.should_auto_add_footer);
    }

    #[test]
    fn official_header_lists_present_fields() {
        let d = data(json!({
            "target_authority": "EXMO. SENHOR DIRECTOR",
            "subject": "Pedido de DUAT",
            "current_city": "Maputo"
        }));
        let decision = ShapeDecision {
            layout_type: LayoutType::Official,
            has_formal_header: false,
            has_formal_footer: false,
            should_auto_add_header: true,
            should_auto_add_footer: true,
        };
        let items = header_section(&decision, "Requerimento", &d, &rules());
        let html = markup(&items);
        assert!(html.contains("<strong>EXMO. SENHOR DIRECTOR</strong>"));
        assert!(html.contains("<strong><u>Assunto: Pedido de DUAT</u></strong>"));
        assert!(html.contains("ql-align-right\"><u>Maputo</u>"));
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn declaration_header_is_centered_title() {
        let decision = ShapeDecision {
            layout_type: LayoutType::Declaration,
            has_formal_header: false,
            has_formal_footer: false,
            should_auto_add_header: true,
            should_auto_add_footer: false,
        };
        let html = markup(&header_section(&decision, "Declaração de Honra", &UserData::new(), &rules()));
        assert_eq!(html, "<p class=\"ql-align-center\"><strong><u>DECLARAÇÃO DE HONRA</u></strong></p>");
    }

    #[test]
    fn footer_for_petition() {
        let d = data(json!({"full_name": "Ana Paulo", "current_city": "Maputo"}));
        let decision = ShapeDecision {
            layout_type: LayoutType::Official,
            has_formal_header: true,
            has_formal_footer: false,
            should_auto_add_header: false,
            should_auto_add_footer: true,
        };
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let items = footer_section(&decision, &d, Some(date), &rules());
        let html = markup(&items);
        assert!(html.contains("Pede deferimento."));
        assert!(html.contains("Maputo, aos 17 de outubro de 2026."));
        assert!(html.contains("<strong>ANA PAULO</strong>"));
        assert!(html.contains("(Assinatura do Requerente)"));
        assert!(items.iter().any(|i| matches!(i, FlowItem::Rule { .. })));
    }

    #[test]
    fn footer_for_declaration_skips_closing() {
        let d = data(json!({"current_date": "3 de março de 2026"}));
        let decision = ShapeDecision {
            layout_type: LayoutType::Declaration,
            has_formal_header: true,
            has_formal_footer: false,
            should_auto_add_header: false,
            should_auto_add_footer: true,
        };
        let html = markup(&footer_section(&decision, &d, None, &rules()));
        assert!(!html.contains("Pede deferimento"));
        assert!(html.contains("Aos 3 de março de 2026."));
        assert!(html.contains("(Assinatura do Declarante)"));
    }

    #[test]
    fn footer_without_any_date_leaves_blank_line() {
        let decision = ShapeDecision {
            layout_type: LayoutType::Letter,
            has_formal_header: true,
            has_formal_footer: false,
            should_auto_add_header: false,
            should_auto_add_footer: true,
        };
        let html = markup(&footer_section(&decision, &UserData::new(), None, &rules()));
        assert!(html.contains(BLANK_DATE));
    }

    #[test]
    fn long_dates_in_portuguese() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(format_long_date(d), "1 de março de 2026");
    }
}
