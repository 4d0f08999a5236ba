use std::collections::HashMap;

use engine::{Decision, EngineError, ItemCounts, Resolution, SplitOutcome, Standing, Submission};
use teloxide::{
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
    utils::html,
};

use crate::parsing::message_link;

/// Rows per balances page.
pub(crate) const BALANCE_PAGE_SIZE: usize = 50;
/// Rows shown across all balances pages.
pub(crate) const BALANCE_BOARD_ROWS: u64 = 250;
pub(crate) const TOP_ROWS: u64 = 10;

/// Known display names, keyed by member id.
pub(crate) type Names = HashMap<String, String>;

/// `1037000` -> `1,037,000`
pub(crate) fn format_silver(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub(crate) fn mention(member_id: i64, names: &Names) -> String {
    let label = names
        .get(&member_id.to_string())
        .map(|name| html::escape(name))
        .unwrap_or_else(|| member_id.to_string());
    format!("<a href=\"tg://user?id={member_id}\">{label}</a>")
}

pub(crate) fn items_text(items: &ItemCounts) -> String {
    if items.is_empty() {
        return "Ninguno".to_string();
    }
    items
        .iter()
        .map(|(code, count)| format!("{code} x{count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn decision_label(decision: Decision) -> &'static str {
    match decision {
        Decision::Approved => "Aprobado",
        Decision::Rejected => "Rechazado",
        Decision::Deferred => "Pendiente",
    }
}

fn decision_emoji(decision: Decision) -> &'static str {
    match decision {
        Decision::Approved => "✅",
        Decision::Rejected => "❌",
        Decision::Deferred => "⏳",
    }
}

pub(crate) fn approval_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Aprobar", "approve"),
        InlineKeyboardButton::callback("❌ Rechazar", "reject"),
        InlineKeyboardButton::callback("⏳ Pendiente", "pending"),
    ]])
}

/// The approval board: the head under review, or a closing note when the
/// queue is empty (and then no buttons).
pub(crate) fn render_approval_board(
    head: Option<&Submission>,
    pending: usize,
    names: &Names,
) -> (String, Option<InlineKeyboardMarkup>) {
    let Some(head) = head else {
        return (
            "🎉 <b>Todos los regear han sido gestionados</b>\nNo quedan solicitudes pendientes."
                .to_string(),
            None,
        );
    };

    let mut text = format!(
        "📥 <b>Solicitud de Regear en Revisión</b>\n\n<b>Jugador:</b> {}\n<b>Números:</b> {}\n<b>Total:</b> {} silver",
        mention(head.submitter.0, names),
        items_text(&head.items),
        format_silver(head.total_value),
    );
    if !head.attachments.is_empty() {
        text.push_str(&format!("\n<b>Imágenes:</b> {}", head.attachments.len()));
    }
    if let Some(link) = message_link(head.origin.chat_id, head.origin.message_id) {
        text.push_str(&format!("\n<a href=\"{link}\">Ver mensaje original</a>"));
    }
    if pending > 1 {
        text.push_str(&format!("\n\n<i>{} más en cola</i>", pending - 1));
    }

    (text, Some(approval_keyboard()))
}

/// Reply to the original submission once it has been resolved.
pub(crate) fn render_outcome(resolution: &Resolution, names: &Names) -> String {
    format!(
        "{} {} tu regear ha sido <b>{}</b>.\nNúmeros: {}\nTotal agregado: {} silver",
        decision_emoji(resolution.decision),
        mention(resolution.submission.submitter.0, names),
        decision_label(resolution.decision),
        items_text(&resolution.submission.items),
        format_silver(resolution.credited),
    )
}

pub(crate) fn render_resolution_log(resolution: &Resolution, reviewer: &str, names: &Names) -> String {
    let submitter = mention(resolution.submission.submitter.0, names);
    let items = items_text(&resolution.submission.items);
    let decision = resolution.decision;
    match decision {
        Decision::Approved => format!(
            "{} {}: {submitter} +{} silver (números: {items}) por {}",
            decision_emoji(decision),
            decision_label(decision),
            format_silver(resolution.credited),
            html::escape(reviewer),
        ),
        Decision::Rejected | Decision::Deferred => format!(
            "{} {}: {submitter} (números: {items}) por {}",
            decision_emoji(decision),
            decision_label(decision),
            html::escape(reviewer),
        ),
    }
}

/// One message per page of up to [`BALANCE_PAGE_SIZE`] rows.
pub(crate) fn render_balance_pages(
    standings: &[Standing],
    names: &Names,
    updated_at: &str,
) -> Vec<String> {
    let footer = format!("\n\n<i>Solo visible para Admins · Última actualización {updated_at}</i>");
    if standings.is_empty() {
        return vec![format!(
            "📊 <b>Balances del Gremio</b>\n\nNo hay datos aún.{footer}"
        )];
    }

    standings
        .chunks(BALANCE_PAGE_SIZE)
        .enumerate()
        .map(|(page, chunk)| {
            let rows: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(idx, standing)| {
                    format!(
                        "<b>{}.</b> {} — {} silver",
                        page * BALANCE_PAGE_SIZE + idx + 1,
                        mention(standing.member_id.0, names),
                        format_silver(standing.balance)
                    )
                })
                .collect();
            format!(
                "📊 <b>Balances del Gremio (página {})</b>\n\n{}{footer}",
                page + 1,
                rows.join("\n")
            )
        })
        .collect()
}

pub(crate) fn render_balance(member_id: i64, balance: i64, rank: Option<u64>, names: &Names) -> String {
    let rank = rank.map_or_else(|| "N/A".to_string(), |rank| rank.to_string());
    format!(
        "💰 <b>Balance de</b> {}\n\nBalance: <code>{} silver</code>\nRanking: <code>#{rank}</code>",
        mention(member_id, names),
        format_silver(balance),
    )
}

pub(crate) fn render_top(standings: &[Standing], names: &Names) -> String {
    if standings.is_empty() {
        return "🏆 No hay jugadores con balance todavía.".to_string();
    }
    let rows: Vec<String> = standings
        .iter()
        .enumerate()
        .map(|(idx, standing)| {
            format!(
                "{}. {}: {} silver",
                idx + 1,
                mention(standing.member_id.0, names),
                format_silver(standing.balance)
            )
        })
        .collect();
    format!("🏆 <b>Top {} jugadores:</b>\n{}", standings.len(), rows.join("\n"))
}

pub(crate) fn render_split(outcome: &SplitOutcome, names: &Names) -> String {
    let members: Vec<String> = outcome
        .members
        .iter()
        .map(|member| mention(member.0, names))
        .collect();
    format!(
        "⚔️ <b>Loot Split</b>\n\n\
         💰 Total Bruto: {}\n\
         🏦 Impuesto ({}%): -{}\n\
         🛠 Reparación: -{}\n\
         💵 Silver Líquido: +{}\n\
         📉 Total Neto: {}\n\
         ⚖️ Cada jugador recibe: {}\n\n\
         <b>Distribución a jugadores ({} afectados)</b>\n{}",
        format_silver(outcome.gross),
        outcome.tax_percent,
        format_silver(outcome.tax),
        format_silver(outcome.repair),
        format_silver(outcome.liquid),
        format_silver(outcome.net),
        format_silver(outcome.per_member),
        outcome.members.len(),
        members.join("\n"),
    )
}

/// Short user-facing explanation of an engine failure.
pub(crate) fn message_for_error(err: &EngineError) -> &'static str {
    match err {
        EngineError::StorageUnavailable(_) | EngineError::Database(_) => {
            "⚠️ El registro de balances no está disponible. Inténtalo más tarde."
        }
        EngineError::EmptyQueue => "❌ No hay solicitudes en cola.",
        EngineError::NotAuthorized(_) => "❌ No tienes permisos.",
        EngineError::InsufficientFunds(_) => "❌ No tienes suficiente balance para transferir.",
        EngineError::InvalidTransfer(_) => {
            "❌ La cantidad debe ser mayor a 0 y el receptor distinto de ti."
        }
        EngineError::InvalidSplit(_) => {
            "❌ Split no válido: indica al menos un jugador, un impuesto entre 0 y 100 y cantidades razonables."
        }
        EngineError::BalanceOverflow(_) => "❌ La cantidad supera el balance máximo permitido.",
    }
}

pub(crate) fn help_text() -> &'static str {
    "📖 <b>Manual del Bot de Regear &amp; Balance</b>\n\n\
     <b>⚔️ Solicitudes de Regear</b>\n\
     - Envía en el chat de regear un mensaje con números (del <code>1</code> al <code>29</code>) y/o imágenes: entra en la cola de aprobación.\n\
     - El chat de aprobación tiene un mensaje fijo con la solicitud actual y los botones <b>Aprobar / Rechazar / Pendiente</b>.\n\
     - Al procesarla se responde a tu mensaje con el resultado.\n\n\
     <b>💰 Balance</b>\n\
     Admins: <code>/addbal [id] cantidad</code>, <code>/balremove [id] cantidad</code>, <code>/pagar [id]</code>, <code>/updatebalances</code>\n\
     Todos: <code>/balance [id]</code> o <code>/bal</code>, <code>/top</code>, <code>/transferir [id] cantidad</code>\n\
     Sin id, el comando actúa sobre el autor del mensaje al que respondes.\n\n\
     <b>⚖️ Loot Split</b>\n\
     <code>/split total id1 id2 ... [19%] [liq=0] [rep=0]</code>\n\
     Impuesto por defecto 19%. Se suma el silver líquido, se resta la reparación y se reparte entre los jugadores."
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use engine::{CommunityId, MemberId, OriginRef};
    use uuid::Uuid;

    use super::*;

    fn submission(items: ItemCounts, total_value: i64) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            community: CommunityId(-1_001_234_567_890),
            submitter: MemberId(77),
            items,
            total_value,
            origin: OriginRef {
                chat_id: -1_001_234_567_890,
                message_id: 9,
            },
            attachments: vec!["photo".to_string()],
            submitted_at: Utc::now(),
        }
    }

    fn standing(member: i64, balance: i64) -> Standing {
        Standing {
            member_id: MemberId(member),
            balance,
        }
    }

    #[test]
    fn formats_thousands() {
        assert_eq!(format_silver(0), "0");
        assert_eq!(format_silver(999), "999");
        assert_eq!(format_silver(1_037_000), "1,037,000");
        assert_eq!(format_silver(-12_345), "-12,345");
    }

    #[test]
    fn mention_escapes_known_names() {
        let mut names = Names::new();
        names.insert("5".to_string(), "<Ana>".to_string());
        assert_eq!(
            mention(5, &names),
            "<a href=\"tg://user?id=5\">&lt;Ana&gt;</a>"
        );
        assert_eq!(mention(6, &names), "<a href=\"tg://user?id=6\">6</a>");
    }

    #[test]
    fn empty_board_has_no_buttons() {
        let (text, keyboard) = render_approval_board(None, 0, &Names::new());
        assert!(text.contains("gestionados"));
        assert!(keyboard.is_none());
    }

    #[test]
    fn board_shows_head_details() {
        let head = submission(ItemCounts::new().with("1", 2), 1_850_000);
        let (text, keyboard) = render_approval_board(Some(&head), 3, &Names::new());
        assert!(text.contains("1 x2"));
        assert!(text.contains("1,850,000 silver"));
        assert!(text.contains("https://t.me/c/1234567890/9"));
        assert!(text.contains("2 más en cola"));
        assert!(keyboard.is_some());
    }

    #[test]
    fn pages_split_every_fifty_rows() {
        let standings: Vec<Standing> = (1..=120).map(|m| standing(m, 1_000 - m)).collect();
        let pages = render_balance_pages(&standings, &Names::new(), "10:00:00");
        assert_eq!(pages.len(), 3);
        assert!(pages[1].contains("<b>51.</b>"));
        assert!(pages[2].contains("página 3"));
        assert!(pages[2].contains("10:00:00"));

        let empty = render_balance_pages(&[], &Names::new(), "10:00:00");
        assert_eq!(empty.len(), 1);
        assert!(empty[0].contains("No hay datos"));
    }

    #[test]
    fn unranked_balance_shows_na() {
        let text = render_balance(9, 0, None, &Names::new());
        assert!(text.contains("#N/A"));
        let text = render_balance(9, 1_500, Some(2), &Names::new());
        assert!(text.contains("1,500 silver"));
        assert!(text.contains("#2"));
    }

    #[test]
    fn storage_failures_get_a_retry_hint() {
        let text = message_for_error(&EngineError::StorageUnavailable("timeout".to_string()));
        assert!(text.contains("Inténtalo más tarde"));
        assert_eq!(message_for_error(&EngineError::EmptyQueue), "❌ No hay solicitudes en cola.");
    }

    #[test]
    fn items_default_to_none_label() {
        assert_eq!(items_text(&ItemCounts::new()), "Ninguno");
        assert_eq!(
            items_text(&ItemCounts::new().with("3", 1).with("28", 2)),
            "3 x1, 28 x2"
        );
    }
}
