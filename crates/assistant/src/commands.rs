//! The literal command table.
//!
//! Parsing is pure: a prefixed utterance body either maps to a [`Command`],
//! is malformed (usage error), or is not a command at all and falls through
//! to the interpreter.

use palaver_core::error::AssistantError;
use palaver_memory::SEP;
use palaver_workflow::ReminderUnit;

/// A recognised command with its parsed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    ConvoLen,
    ResetThread,
    ShowThread,
    GptSettings,
    GptSet { key: String, value: String },
    CurrentPrompt,
    ChangePrompt(String),
    ShowPrompts,
    ListModels,
    ModifyPrompts,
    SaveThread,
    ShowOldThreads,
    LoadThread(String),
    DeleteThread(String),
    CurrentModel,
    Swap,
    /// `_add_and_set_prompt<SEP>name<SEP>text<SEP>reset`
    AddAndSetPrompt { name: String, text: String, reset: bool },
    RemindMe { task: String, amount: f64, unit: ReminderUnit },
    CancelReminder(u64),
}

/// `(name, description)` rows shown by `help`.
const HELP_TABLE: &[(&str, &str)] = &[
    ("help (h)", "display this message"),
    ("convo len (cl)", "show current context length"),
    ("reset thread (rt)", "reset the conversation to the current prompt"),
    ("show thread (st)", "show the entire current conversation"),
    ("gptsettings", "show the current generation settings"),
    ("gptset", "format is `gptset [setting_name] [new_value]`, modify generation settings"),
    ("current prompt (cp)", "get the current prompt name"),
    ("change prompt (chp)", "format is `change prompt, [prompt name]` (resets the conversation)"),
    ("show prompts (lp)", "list the available prompts"),
    ("list models (lm)", "list the available models"),
    ("modify prompts", "add, edit, delete or rename prompts"),
    ("save thread (save)", "save the current conversation"),
    ("show old threads", "show the conversations that have been saved"),
    ("load thread (load)", "format is `load thread, [thread id]`, load a saved conversation"),
    ("delete thread", "format is `delete thread, [thread id]`, delete a saved conversation"),
    ("current model (cm)", "show the current model"),
    ("swap", "hotswap between the two configured models"),
];

const REMINDER_HELP: &[(&str, &str)] = &[
    ("remind me", "format is `remind me, [task], [amount], [unit s|m|h|d]`, ping you later"),
    ("cancel reminder", "format is `cancel reminder, [reminder id]`"),
];

/// Expand the short forms (`rt`, `chp, x`, `load, x` ...) to full commands.
pub fn expand_shortcut(body: &str) -> String {
    let full = match body {
        "h" => Some("help"),
        "rt" => Some("reset thread"),
        "cl" => Some("convo len"),
        "st" => Some("show thread"),
        "cp" => Some("current prompt"),
        "lm" => Some("list models"),
        "cm" => Some("current model"),
        "lp" => Some("list prompts"),
        "save" => Some("save thread"),
        _ => None,
    };
    if let Some(full) = full {
        return full.to_string();
    }
    if let Some(rest) = strip_word(body, "chp") {
        return format!("change prompt{rest}");
    }
    if strip_word(body, "load thread").is_none() {
        if let Some(rest) = strip_word(body, "load") {
            return format!("load thread{rest}");
        }
    }
    body.to_string()
}

/// Parse a command body (prefix stripped, shortcuts expanded).
///
/// `None` means the body is not a command.
pub fn parse(body: &str, reminders_enabled: bool) -> Option<Result<Command, AssistantError>> {
    let body = body.trim();

    let bare = match body {
        "help" => Some(Command::Help),
        "convo len" => Some(Command::ConvoLen),
        "reset thread" => Some(Command::ResetThread),
        "show thread" => Some(Command::ShowThread),
        "gptsettings" => Some(Command::GptSettings),
        "current prompt" => Some(Command::CurrentPrompt),
        "show prompts" | "list prompts" => Some(Command::ShowPrompts),
        "list models" => Some(Command::ListModels),
        "modify prompts" => Some(Command::ModifyPrompts),
        "save thread" => Some(Command::SaveThread),
        "show old threads" => Some(Command::ShowOldThreads),
        "current model" => Some(Command::CurrentModel),
        "swap" => Some(Command::Swap),
        _ => None,
    };
    if let Some(cmd) = bare {
        return Some(Ok(cmd));
    }

    if let Some(rest) = strip_word(body, "gptset") {
        return Some(parse_gptset(rest));
    }
    if let Some(rest) = strip_word(body, "change prompt") {
        return Some(single_arg(rest, "change prompt, [prompt name]").map(Command::ChangePrompt));
    }
    if let Some(rest) = strip_word(body, "load thread") {
        return Some(thread_id(rest, "load thread, [thread id]").map(Command::LoadThread));
    }
    if let Some(rest) = strip_word(body, "delete thread") {
        return Some(thread_id(rest, "delete thread, [thread id]").map(Command::DeleteThread));
    }
    if let Some(rest) = body.strip_prefix("_add_and_set_prompt") {
        if rest.is_empty() || rest.starts_with(SEP) {
            return Some(parse_add_and_set(rest));
        }
    }
    if let Some(rest) = strip_word(body, "remind me") {
        return Some(reminders(reminders_enabled).and_then(|_| parse_remind_me(rest)));
    }
    if let Some(rest) = strip_word(body, "cancel reminder") {
        return Some(reminders(reminders_enabled).and_then(|_| {
            let usage = "cancel reminder, [reminder id]";
            single_arg(rest, usage)?
                .parse()
                .map(Command::CancelReminder)
                .map_err(|_| AssistantError::usage(usage))
        }));
    }

    None
}

/// The `help` reply: an aligned `name -- description` table.
pub fn help_text(reminders_enabled: bool) -> String {
    let rows: Vec<&(&str, &str)> = if reminders_enabled {
        HELP_TABLE.iter().chain(REMINDER_HELP).collect()
    } else {
        HELP_TABLE.iter().collect()
    };
    let width = rows.iter().map(|(name, _)| name.chars().count()).max().unwrap_or(0);

    let mut out = String::from("```\n");
    for (name, desc) in rows {
        out.push_str(&format!("{name:<width$} -- {desc}\n"));
    }
    out.push_str("```");
    out
}

/// System prompt for the one-shot interpretation of an unknown command.
pub fn interpreter_prompt(prefix: &str, reminders_enabled: bool) -> String {
    let mut prompt = String::from(
        "You are a personal assistant who interprets user requests into one of the hard-coded commands listed below, or otherwise responds to the best of your knowledge.\n\nThe hard-coded commands are:\n",
    );
    prompt.push_str(&help_text(reminders_enabled));
    prompt.push_str(&format!(
        "\n\nIf you recognize what the user wants, output a single line that activates the hard-coded command, prefixed with {prefix}, and nothing else. Otherwise, talk."
    ));
    prompt
}

/// `body` minus a leading `word`, if `word` ends at a word boundary.
fn strip_word<'a>(body: &'a str, word: &str) -> Option<&'a str> {
    let rest = body.strip_prefix(word)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c == ',' || c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

/// `, value` → `value`. Everything after the first comma is the argument.
fn single_arg(rest: &str, usage: &str) -> Result<String, AssistantError> {
    let arg = rest
        .trim_start()
        .strip_prefix(',')
        .map(str::trim)
        .unwrap_or_default();
    if arg.is_empty() {
        Err(AssistantError::usage(usage))
    } else {
        Ok(arg.to_string())
    }
}

fn thread_id(rest: &str, usage: &str) -> Result<String, AssistantError> {
    let id = single_arg(rest, usage)?;
    let id = id.strip_suffix(".json").unwrap_or(&id).trim();
    if id.is_empty() {
        Err(AssistantError::usage(usage))
    } else {
        Ok(id.to_string())
    }
}

/// `gptset model gpt-4` and `gptset, model, gpt-4` are both accepted.
fn parse_gptset(rest: &str) -> Result<Command, AssistantError> {
    let rest = rest.replace(',', " ");
    let fields: Vec<&str> = rest.split_whitespace().collect();
    match fields.as_slice() {
        [key, value] => Ok(Command::GptSet {
            key: key.to_string(),
            value: value.to_string(),
        }),
        _ => Err(AssistantError::usage("gptset <setting_name> <new_value>")),
    }
}

fn parse_add_and_set(rest: &str) -> Result<Command, AssistantError> {
    let usage = || AssistantError::usage(format!("_add_and_set_prompt{SEP}[name]{SEP}[prompt]{SEP}[reset]"));
    let fields: Vec<&str> = rest.split(SEP).skip(1).collect();
    let [name, text, reset] = fields.as_slice() else {
        return Err(usage());
    };
    if name.trim().is_empty() {
        return Err(usage());
    }
    let reset = matches!(reset.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1");
    Ok(Command::AddAndSetPrompt {
        name: name.trim().to_string(),
        text: text.to_string(),
        reset,
    })
}

/// `remind me, <task>, <amount>, <unit>`. The task may itself contain commas.
fn parse_remind_me(rest: &str) -> Result<Command, AssistantError> {
    let usage = || AssistantError::usage("remind me, [task], [amount], [unit s|m|h|d]");
    let args = rest.trim_start().strip_prefix(',').ok_or_else(usage)?;

    let mut fields = args.rsplitn(3, ',');
    let (Some(unit), Some(amount), Some(task)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(usage());
    };
    let task = task.trim();
    let amount: f64 = amount.trim().parse().map_err(|_| usage())?;
    let unit = ReminderUnit::parse(unit).ok_or_else(usage)?;
    if task.is_empty() || unit.delay(amount).is_none() {
        return Err(usage());
    }
    Ok(Command::RemindMe {
        task: task.to_string(),
        amount,
        unit,
    })
}

fn reminders(enabled: bool) -> Result<(), AssistantError> {
    if enabled {
        Ok(())
    } else {
        Err(AssistantError::State("Reminders are not enabled here.".into()))
    }
}
