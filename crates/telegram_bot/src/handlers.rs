use chrono::Utc;
use engine::{
    CommunityId, Decision, Direction, EngineError, MemberId, OriginRef, Resolution, SplitCmd,
    SubmitCmd,
};
use teloxide::{
    ApiError, RequestError,
    prelude::*,
    types::{CallbackQuery, ChatId, MessageId, ParseMode, ReplyParameters, User},
    utils::html,
};

use crate::{
    ConfigParameters,
    commands::{Command, SplitArgs, parse_command},
    ui,
};

pub(crate) async fn handle_message(
    bot: Bot,
    msg: Message,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    if from.is_bot {
        return Ok(());
    }
    remember(&cfg, from).await;

    let text = msg.text().or_else(|| msg.caption()).unwrap_or_default();

    if let Some(parsed) = parse_command(text) {
        match parsed {
            Ok(cmd) => handle_command(&bot, &msg, from, &cfg, cmd).await?,
            Err(err) => {
                reply(&bot, &msg, format!("❌ {}", html::escape(&err.to_string()))).await?;
            }
        }
        return Ok(());
    }

    if msg.chat.id == cfg.chats.regear {
        handle_submission(&bot, &msg, from, text, &cfg).await;
    }

    Ok(())
}

pub(crate) async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Ok(decision) = Decision::try_from(data) else {
        tracing::debug!("ignoring callback data {data}");
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };

    let authorized = is_admin(&cfg, &q.from);
    let resolution = match cfg
        .engine
        .resolve(cfg.community(), decision, authorized)
        .await
    {
        Ok(resolution) => resolution,
        Err(err) => {
            if err.is_storage_failure() {
                tracing::error!("resolving the head failed: {err}");
            }
            let _ = bot
                .answer_callback_query(q.id.clone())
                .text(ui::message_for_error(&err))
                .show_alert(true)
                .await;
            return Ok(());
        }
    };

    let _ = bot
        .answer_callback_query(q.id.clone())
        .text(format!(
            "Solicitud procesada: {}",
            ui::decision_label(resolution.decision)
        ))
        .await;

    let names = cfg.boards.names().await;
    notify_submitter(&bot, &resolution, &names).await;
    send_log(
        &bot,
        &cfg,
        ui::render_resolution_log(&resolution, &q.from.full_name(), &names),
    )
    .await;

    refresh_approval_board(&bot, &cfg).await;
    refresh_balances_board(&bot, &cfg).await;

    Ok(())
}

async fn handle_submission(
    bot: &Bot,
    msg: &Message,
    from: &User,
    text: &str,
    cfg: &ConfigParameters,
) {
    let Some(submitter) = member_of(from) else {
        return;
    };

    let cmd = SubmitCmd::new(
        cfg.community(),
        submitter,
        OriginRef {
            chat_id: msg.chat.id.0,
            message_id: i64::from(msg.id.0),
        },
    )
    .appraised(cfg.prices.count_items(text), &cfg.prices)
    .attachments(attachments_of(msg));

    if !cmd.is_eligible() {
        return;
    }

    if cfg.engine.submit(cmd).await {
        refresh_approval_board(bot, cfg).await;
    }
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    from: &User,
    cfg: &ConfigParameters,
    cmd: Command,
) -> ResponseResult<()> {
    if cmd.admin_only() && !is_admin(cfg, from) {
        reply(bot, msg, "❌ No tienes permisos.").await?;
        return Ok(());
    }
    let Some(caller) = member_of(from) else {
        return Ok(());
    };
    let community = cfg.community();
    let names = cfg.boards.names().await;
    let executor = html::escape(&from.full_name());

    match cmd {
        Command::Help => {
            reply(bot, msg, ui::help_text()).await?;
        }
        Command::Top => match cfg.engine.leaderboard(community, Some(ui::TOP_ROWS)).await {
            Ok(standings) => reply(bot, msg, ui::render_top(&standings, &names)).await?,
            Err(err) => reply(bot, msg, ui::message_for_error(&err)).await?,
        },
        Command::Balance { member } => {
            let target = target_of(msg, member).unwrap_or(caller);
            match balance_and_rank(cfg, community, target).await {
                Ok((balance, rank)) => {
                    reply(bot, msg, ui::render_balance(target.0, balance, rank, &names)).await?;
                }
                Err(err) => reply(bot, msg, ui::message_for_error(&err)).await?,
            }
        }
        Command::AddBalance { amount, .. } | Command::RemoveBalance { amount, .. }
            if amount <= 0 =>
        {
            reply(bot, msg, "❌ La cantidad debe ser mayor a 0.").await?;
        }
        Command::AddBalance { member, amount } => {
            let Some(target) = target_of(msg, member) else {
                return missing_target(bot, msg).await;
            };
            match cfg
                .engine
                .adjust_balance(community, target, amount, Direction::Credit)
                .await
            {
                Ok(balance) => {
                    reply(
                        bot,
                        msg,
                        format!(
                            "✅ {} silver añadidos a {}. Balance actual: {}",
                            ui::format_silver(amount),
                            ui::mention(target.0, &names),
                            ui::format_silver(balance)
                        ),
                    )
                    .await?;
                    send_log(
                        bot,
                        cfg,
                        format!(
                            "ADMIN {executor} añadió {} silver a {}",
                            ui::format_silver(amount),
                            ui::mention(target.0, &names)
                        ),
                    )
                    .await;
                    refresh_balances_board(bot, cfg).await;
                }
                Err(err) => reply(bot, msg, ui::message_for_error(&err)).await?,
            }
        }
        Command::RemoveBalance { member, amount } => {
            let Some(target) = target_of(msg, member) else {
                return missing_target(bot, msg).await;
            };
            match cfg
                .engine
                .adjust_balance(community, target, amount, Direction::Debit)
                .await
            {
                Ok(balance) => {
                    reply(
                        bot,
                        msg,
                        format!(
                            "✅ {} silver removidos de {}. Balance actual: {}",
                            ui::format_silver(amount),
                            ui::mention(target.0, &names),
                            ui::format_silver(balance)
                        ),
                    )
                    .await?;
                    send_log(
                        bot,
                        cfg,
                        format!(
                            "ADMIN {executor} removió {} silver de {}",
                            ui::format_silver(amount),
                            ui::mention(target.0, &names)
                        ),
                    )
                    .await;
                    refresh_balances_board(bot, cfg).await;
                }
                Err(err) => reply(bot, msg, ui::message_for_error(&err)).await?,
            }
        }
        Command::Pay { member } => {
            let Some(target) = target_of(msg, member) else {
                return missing_target(bot, msg).await;
            };
            match cfg.engine.payout(community, target).await {
                Ok(paid) => {
                    reply(
                        bot,
                        msg,
                        format!(
                            "✅ Se pagó <code>{} silver</code> a {}. Ahora su balance es 0.",
                            ui::format_silver(paid),
                            ui::mention(target.0, &names)
                        ),
                    )
                    .await?;
                    send_log(
                        bot,
                        cfg,
                        format!(
                            "ADMIN {executor} pagó {} silver a {}",
                            ui::format_silver(paid),
                            ui::mention(target.0, &names)
                        ),
                    )
                    .await;
                    refresh_balances_board(bot, cfg).await;
                }
                Err(err) => reply(bot, msg, ui::message_for_error(&err)).await?,
            }
        }
        Command::UpdateBalances => {
            refresh_balances_board(bot, cfg).await;
            reply(bot, msg, "✅ Lista de balances actualizada correctamente.").await?;
        }
        Command::Transfer { member, amount } => {
            let Some(target) = target_of(msg, member) else {
                return missing_target(bot, msg).await;
            };
            match cfg.engine.transfer(community, caller, target, amount).await {
                Ok(transfer) => {
                    reply(
                        bot,
                        msg,
                        format!(
                            "✅ {} transfirió <code>{} silver</code> a {}.\nTu nuevo balance: <code>{} silver</code>\nBalance de {}: <code>{} silver</code>",
                            ui::mention(caller.0, &names),
                            ui::format_silver(amount),
                            ui::mention(target.0, &names),
                            ui::format_silver(transfer.from_balance),
                            ui::mention(target.0, &names),
                            ui::format_silver(transfer.to_balance)
                        ),
                    )
                    .await?;
                    send_log(
                        bot,
                        cfg,
                        format!(
                            "{executor} transfirió {} silver a {}",
                            ui::format_silver(amount),
                            ui::mention(target.0, &names)
                        ),
                    )
                    .await;
                    refresh_balances_board(bot, cfg).await;
                }
                Err(err) => reply(bot, msg, ui::message_for_error(&err)).await?,
            }
        }
        Command::Split(args) => {
            let cmd = split_cmd(community, args);
            match cfg.engine.split(cmd).await {
                Ok(outcome) => {
                    reply(bot, msg, ui::render_split(&outcome, &names)).await?;
                    send_log(
                        bot,
                        cfg,
                        format!(
                            "{executor} hizo split: total {}, impuesto {}%, reparación {}, líquido {}, jugadores {}",
                            ui::format_silver(outcome.gross),
                            outcome.tax_percent,
                            ui::format_silver(outcome.repair),
                            ui::format_silver(outcome.liquid),
                            outcome.members.len()
                        ),
                    )
                    .await;
                    refresh_balances_board(bot, cfg).await;
                }
                Err(err) => reply(bot, msg, ui::message_for_error(&err)).await?,
            }
        }
    }

    Ok(())
}

/// Re-render the approval board in place, posting it again when the old
/// message cannot be edited.
pub(crate) async fn refresh_approval_board(bot: &Bot, cfg: &ConfigParameters) {
    let _rendering = cfg.boards.rendering().await;

    let community = cfg.community();
    let head = cfg.engine.head(community).await;
    let pending = cfg.engine.pending(community).await;
    let names = cfg.boards.names().await;
    let (text, keyboard) = ui::render_approval_board(head.as_ref(), pending, &names);
    let chat = cfg.chats.approval;

    if let Some(message_id) = cfg.boards.approval_message().await {
        let mut edit = bot
            .edit_message_text(chat, message_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard.clone() {
            edit = edit.reply_markup(keyboard);
        }
        match edit.await {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => return,
            Err(err) => tracing::warn!("approval board edit failed, posting a new one: {err}"),
        }
    }

    let mut send = bot.send_message(chat, text).parse_mode(ParseMode::Html);
    if let Some(keyboard) = keyboard {
        send = send.reply_markup(keyboard);
    }
    match send.await {
        Ok(sent) => {
            if let Err(err) = cfg
                .boards
                .update(|file| file.approval_message = Some(sent.id.0))
                .await
            {
                tracing::warn!("{err}");
            }
        }
        Err(err) => tracing::warn!("approval board could not be posted: {err}"),
    }
}

/// Re-render the paged balances board, if one is configured.
pub(crate) async fn refresh_balances_board(bot: &Bot, cfg: &ConfigParameters) {
    let Some(chat) = cfg.chats.balances else {
        return;
    };
    let _rendering = cfg.boards.rendering().await;

    let standings = match cfg
        .engine
        .leaderboard(cfg.community(), Some(ui::BALANCE_BOARD_ROWS))
        .await
    {
        Ok(standings) => standings,
        Err(err) => {
            tracing::error!("balances board not refreshed: {err}");
            return;
        }
    };
    let names = cfg.boards.names().await;
    let updated_at = Utc::now()
        .with_timezone(&cfg.timezone)
        .format("%d/%m/%Y %H:%M:%S")
        .to_string();
    let pages = ui::render_balance_pages(&standings, &names, &updated_at);

    let mut existing = cfg.boards.balance_pages().await;
    while existing.len() > pages.len() {
        if let Some(stale) = existing.pop()
            && let Err(err) = bot.delete_message(chat, stale).await
        {
            tracing::warn!("stale balances page not deleted: {err}");
        }
    }

    let mut kept: Vec<MessageId> = Vec::with_capacity(pages.len());
    for (idx, page) in pages.into_iter().enumerate() {
        if let Some(message_id) = existing.get(idx).copied() {
            match bot
                .edit_message_text(chat, message_id, page.clone())
                .parse_mode(ParseMode::Html)
                .await
            {
                Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => {
                    kept.push(message_id);
                    continue;
                }
                Err(err) => tracing::warn!("balances page {} edit failed: {err}", idx + 1),
            }
        }

        match bot.send_message(chat, page).parse_mode(ParseMode::Html).await {
            Ok(sent) => kept.push(sent.id),
            Err(err) => tracing::warn!("balances page {} could not be posted: {err}", idx + 1),
        }
    }

    let kept: Vec<i32> = kept.into_iter().map(|id| id.0).collect();
    if let Err(err) = cfg.boards.update(|file| file.balance_pages = kept).await {
        tracing::warn!("{err}");
    }
}

/// Deliver one audit line to the logs chat. Never fails the caller.
async fn send_log(bot: &Bot, cfg: &ConfigParameters, text: String) {
    let Some(chat) = cfg.chats.logs else {
        return;
    };
    if let Err(err) = bot
        .send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .await
    {
        tracing::warn!("log line not delivered: {err}");
    }
}

async fn notify_submitter(bot: &Bot, resolution: &Resolution, names: &ui::Names) {
    let origin = resolution.submission.origin;
    let Ok(message_id) = i32::try_from(origin.message_id) else {
        return;
    };

    if let Err(err) = bot
        .send_message(ChatId(origin.chat_id), ui::render_outcome(resolution, names))
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(MessageId(message_id)).allow_sending_without_reply())
        .await
    {
        tracing::warn!(
            "outcome of submission {} not delivered: {err}",
            resolution.submission.id
        );
    }
}

async fn balance_and_rank(
    cfg: &ConfigParameters,
    community: CommunityId,
    member: MemberId,
) -> Result<(i64, Option<u64>), EngineError> {
    let balance = cfg.engine.balance(community, member).await?;
    let rank = cfg.engine.rank(community, member).await?;
    Ok((balance, rank))
}

async fn reply(bot: &Bot, msg: &Message, text: impl Into<String>) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id).allow_sending_without_reply())
        .await?;
    Ok(())
}

async fn missing_target(bot: &Bot, msg: &Message) -> ResponseResult<()> {
    reply(
        bot,
        msg,
        "❌ Indica el jugador: responde a uno de sus mensajes o escribe su id.",
    )
    .await
}

async fn remember(cfg: &ConfigParameters, user: &User) {
    let Some(member) = member_of(user) else {
        return;
    };
    if let Err(err) = cfg.boards.remember_name(member.0, &user.full_name()).await {
        tracing::warn!("{err}");
    }
}

fn split_cmd(community: CommunityId, args: SplitArgs) -> SplitCmd {
    let members = args.members.into_iter().map(MemberId).collect();
    let cmd = SplitCmd::new(community, args.gross, members)
        .liquid(args.liquid)
        .repair(args.repair);
    match args.tax_percent {
        Some(tax_percent) => cmd.tax_percent(tax_percent),
        None => cmd,
    }
}

/// Explicit id first, then the author of the replied-to message.
fn target_of(msg: &Message, explicit: Option<i64>) -> Option<MemberId> {
    if let Some(id) = explicit {
        return Some(MemberId(id));
    }
    msg.reply_to_message()
        .and_then(|replied| replied.from.as_ref())
        .filter(|user| !user.is_bot)
        .and_then(member_of)
}

fn member_of(user: &User) -> Option<MemberId> {
    i64::try_from(user.id.0).ok().map(MemberId)
}

/// Media references of a message: the largest size of a photo, or a
/// document.
fn attachments_of(msg: &Message) -> Vec<String> {
    let mut attachments = Vec::new();
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        attachments.push(photo.file.id.0.clone());
    }
    if let Some(document) = msg.document() {
        attachments.push(document.file.id.0.clone());
    }
    attachments
}

fn is_admin(cfg: &ConfigParameters, user: &User) -> bool {
    cfg.admins.contains(&user.id)
}
