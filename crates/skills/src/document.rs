//! `SkillDocument`/`SkillContract` loading from SKILL.md frontmatter (spec
//! §3.7). Grounded on the teacher's `parse_frontmatter` (`manifest.rs`):
//! same `---`-delimited YAML block extraction and the same
//! log-then-still-return posture on a malformed block, but the YAML shape
//! now mirrors `SkillContract` field-for-field instead of the teacher's
//! install/requires manifest.

use sa_domain::skill::{
    Budget, CostHint, Dispatch, InstallEntry, SkillContract, SkillDocument, SkillRequirements, Stability, Tier,
    ToolsPolicy, Triggers,
};
use serde::Deserialize;

/// Frontmatter shape. Mirrors `SkillContract` but omits `name`/`tier`,
/// which are resolved by the caller (name defaults to the file stem; tier
/// is fixed by which root the file was discovered under).
#[derive(Debug, Deserialize, Default)]
struct ContractFrontmatter {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    anti_tags: Vec<String>,
    #[serde(default)]
    triggers: Option<Triggers>,
    #[serde(default)]
    dispatch: Option<Dispatch>,
    #[serde(default)]
    tools: ToolsPolicy,
    #[serde(default)]
    budget: Budget,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default)]
    composable_with: Vec<String>,
    #[serde(default)]
    consumes: Vec<String>,
    #[serde(default)]
    escalation_path: Option<String>,
    #[serde(default)]
    max_parallel: Option<u32>,
    #[serde(default)]
    stability: Option<Stability>,
    #[serde(default)]
    cost_hint: Option<CostHint>,
    #[serde(default)]
    requires: SkillRequirements,
    #[serde(default)]
    install: Vec<InstallEntry>,
}

/// Split `content` into `(frontmatter_yaml, body)`. Returns `None` for the
/// frontmatter half when there's no opening/closing `---` pair — the
/// caller then falls back to treating the whole file as an untitled body.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("---") {
        return (None, content);
    }
    let after_open = &trimmed[3..];
    match after_open.find("\n---") {
        Some(close_idx) => {
            let yaml = &after_open[..close_idx];
            let body_start = close_idx + 4;
            let body = after_open[body_start..].trim_start_matches('\n');
            (Some(yaml), body)
        }
        None => (None, content),
    }
}

/// Parse a SKILL.md file's contents into a `SkillDocument`. `name_hint` is
/// the skill's directory/file stem, used when the frontmatter omits
/// `name`. Returns `None` when the frontmatter is absent or malformed, or
/// `description` is missing — both logged rather than propagated, per the
/// tape's "skip with a warning" posture (spec §7).
pub fn parse_skill_document(
    content: &str,
    tier: Tier,
    name_hint: &str,
    file_path: &str,
    base_dir: &str,
) -> Option<SkillDocument> {
    let (yaml, body) = split_frontmatter(content);
    let yaml = match yaml {
        Some(y) => y,
        None => {
            tracing::warn!(file_path, "SKILL.md missing frontmatter block");
            return None;
        }
    };

    let fm: ContractFrontmatter = match serde_yaml::from_str(yaml) {
        Ok(fm) => fm,
        Err(e) => {
            tracing::warn!(file_path, error = %e, "failed to parse SKILL.md frontmatter");
            return None;
        }
    };

    let name = fm.name.clone().unwrap_or_else(|| name_hint.to_string());
    let description = match fm.description {
        Some(d) if !d.is_empty() => d,
        _ => {
            tracing::warn!(file_path, "SKILL.md missing required description");
            return None;
        }
    };

    let mut dispatch = fm.dispatch;
    if let Some(d) = dispatch.as_mut() {
        if d.auto_threshold < d.gate_threshold {
            tracing::warn!(
                file_path,
                "dispatch.auto_threshold below gate_threshold; raising to match"
            );
            d.auto_threshold = d.gate_threshold;
        }
    }

    let contract = SkillContract {
        name: name.clone(),
        tier,
        tags: fm.tags,
        anti_tags: fm.anti_tags,
        triggers: fm.triggers,
        dispatch,
        tools: fm.tools,
        budget: fm.budget,
        outputs: fm.outputs,
        composable_with: fm.composable_with,
        consumes: fm.consumes,
        escalation_path: fm.escalation_path,
        max_parallel: fm.max_parallel,
        stability: fm.stability.unwrap_or(Stability::Stable),
        cost_hint: fm.cost_hint.unwrap_or(CostHint::Medium),
        requires: fm.requires,
        install: fm.install,
    };

    Some(SkillDocument {
        name,
        description,
        tier,
        file_path: file_path.to_string(),
        base_dir: base_dir.to_string(),
        markdown: body.to_string(),
        contract,
    })
}
