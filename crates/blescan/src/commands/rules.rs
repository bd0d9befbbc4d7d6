//! Filter rule command handlers.

use serde::Serialize;
use tabled::Tabled;

use blescan_core::{
    FilterEngine, FilterRule, ListKind, MatchTarget, RuleStore, validate_rule,
};

use crate::cli::{GlobalOpts, KindArg, RuleAddArgs, RulesArgs, RulesCommand, TargetArg};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Pattern")]
    pattern: String,
    #[tabled(rename = "Regex")]
    regex: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Alias")]
    alias: String,
}

impl From<&FilterRule> for RuleRow {
    fn from(r: &FilterRule) -> Self {
        Self {
            id: util::short_id(&r.id),
            kind: r.list_kind.to_string(),
            target: r.match_target.to_string(),
            pattern: r.pattern.clone(),
            regex: yes_no(r.regex_enabled),
            enabled: yes_no(r.enabled),
            alias: r.display_alias.clone(),
        }
    }
}

fn yes_no(value: bool) -> String {
    String::from(if value { "yes" } else { "no" })
}

fn visibility(visible: bool) -> &'static str {
    if visible { "visible" } else { "hidden" }
}

fn detail(r: &FilterRule) -> String {
    let mut lines = vec![
        format!("ID:       {}", r.id),
        format!("Kind:     {}", r.list_kind),
        format!("Target:   {}", r.match_target),
        format!("Pattern:  {}", r.pattern),
        format!("Regex:    {}", yes_no(r.regex_enabled)),
        format!("Enabled:  {}", yes_no(r.enabled)),
    ];
    if !r.display_alias.is_empty() {
        lines.push(format!("Alias:    {}", r.display_alias));
    }
    if !r.note.is_empty() {
        lines.push(format!("Note:     {}", r.note));
    }
    lines.push(format!("Updated:  {}", r.updated_at.format("%Y-%m-%d %H:%M:%S UTC")));
    lines.join("\n")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Verdict {
    address: String,
    name: Option<String>,
    visible: bool,
    enabled_rules: usize,
}

impl From<TargetArg> for MatchTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Name => Self::Name,
            TargetArg::Address => Self::Address,
        }
    }
}

impl From<KindArg> for ListKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Allow => Self::Allow,
            KindArg::Deny => Self::Deny,
        }
    }
}

fn build_rule(args: RuleAddArgs) -> FilterRule {
    let mut rule = FilterRule::new(args.pattern, args.target.into(), args.kind.into())
        .with_regex(args.regex)
        .with_enabled(!args.disabled);
    if let Some(alias) = args.alias {
        rule = rule.with_alias(alias);
    }
    if let Some(note) = args.note {
        rule = rule.with_note(note);
    }
    rule
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: RulesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let store = config::rule_store(global, &cfg);

    match args.command {
        RulesCommand::List => {
            let rules = store.list_all()?;
            let out = output::render_list(
                &global.output,
                &rules,
                |r| RuleRow::from(r),
                |r| r.id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Add(add) => {
            let rule = build_rule(add);
            validate_rule(&rule)?;
            store.upsert(rule.clone())?;
            tracing::info!(rule_id = %rule.id, path = %store.path().display(), "rule added");
            let out = output::render_single(&global.output, &rule, detail, |r| r.id.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Remove { id } => {
            let rule = util::resolve_rule(&store, &id)?;
            store.delete(&rule.id)?;
            if !global.quiet {
                eprintln!("Removed rule {} ({})", util::short_id(&rule.id), rule.label());
            }
            Ok(())
        }

        RulesCommand::Enable { id } => set_enabled(&store, &id, true, global),

        RulesCommand::Disable { id } => set_enabled(&store, &id, false, global),

        RulesCommand::Test { address, name } => {
            let engine = FilterEngine::new();
            let enabled_rules = engine.reload(&store)?;
            let visible = engine.decide(name.as_deref(), &address);
            let verdict = Verdict {
                address,
                name,
                visible,
                enabled_rules,
            };
            let out = output::render_single(
                &global.output,
                &verdict,
                |v| {
                    format!(
                        "{} is {} ({} enabled rules)",
                        v.address,
                        visibility(v.visible),
                        v.enabled_rules
                    )
                },
                |v| visibility(v.visible).to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

fn set_enabled(
    store: &dyn RuleStore,
    identifier: &str,
    enabled: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut rule = util::resolve_rule(store, identifier)?;
    if rule.enabled != enabled {
        rule.set_enabled(enabled);
        store.upsert(rule.clone())?;
    }
    let out = output::render_single(&global.output, &rule, detail, |r| r.id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
