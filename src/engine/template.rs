// src/engine/template.rs

//! Engine configuration templating
//!
//! Templates reference run values as `${NAME}`. Rendering is strict: every
//! referenced name must be bound, otherwise generation fails and lists the
//! unbound names instead of emitting an empty value.

use crate::config::RunContext;
use crate::error::{Error, Result};
use crate::pool::Pool;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use super::RunArtifacts;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"));

/// Built-in engine configuration
const BUILTIN_TEMPLATE: &str = "\
# Generated for ${SERIES} run ${RUN_TAG}; edits are overwritten every run.

TESTING           = ${TESTING_DIR}
UNSTABLE          = ${UNSTABLE_DIR}

NONINST_STATUS    = ${OUTPUT_DIR}/non-installable-status
EXCUSES_OUTPUT    = ${OUTPUT_DIR}/excuses.html
EXCUSES_YAML_OUTPUT = ${OUTPUT_DIR}/excuses.yaml
UPGRADE_OUTPUT    = ${OUTPUT_DIR}/output.txt
HEIDI_OUTPUT      = ${HEIDI_OUTPUT}
HEIDI_DELTA_OUTPUT = ${HEIDI_DELTA_OUTPUT}

ARCHITECTURES     = ${ARCHITECTURES}
NOBREAKALL_ARCHES = ${NOBREAKALL_ARCHES}
BREAK_ARCHES      = ${BREAK_ARCHES}

MINDAYS_LOW       = ${MINDAYS_LOW}
MINDAYS_MEDIUM    = ${MINDAYS_MEDIUM}
MINDAYS_HIGH      = ${MINDAYS_HIGH}
MINDAYS_CRITICAL  = ${MINDAYS_CRITICAL}
MINDAYS_EMERGENCY = ${MINDAYS_EMERGENCY}
DEFAULT_URGENCY   = medium

HINTSDIR          = ${HINTS_DIR}
${HINT_PERMISSIONS}

SMOOTH_UPDATES    = ${SMOOTH_UPDATES}
";

/// An engine configuration template
#[derive(Debug, Clone)]
pub struct ConfigTemplate {
    source: String,
}

impl ConfigTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_TEMPLATE)
    }

    /// Load a template file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigGeneration(format!("Failed to read template {}: {e}", path.display()))
        })?;
        Ok(Self::new(source))
    }

    /// The operator's template if configured, otherwise the built-in one
    pub fn for_context(ctx: &RunContext) -> Result<Self> {
        match &ctx.paths.template {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Names referenced by the template
    pub fn placeholders(&self) -> BTreeSet<String> {
        PLACEHOLDER
            .captures_iter(&self.source)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Substitute every placeholder, failing if any is unbound
    pub fn render(&self, bindings: &BTreeMap<String, String>) -> Result<String> {
        let missing: Vec<String> = self
            .placeholders()
            .into_iter()
            .filter(|name| !bindings.contains_key(name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::ConfigGeneration(format!(
                "unbound template variables: {}",
                missing.join(", ")
            )));
        }

        Ok(PLACEHOLDER
            .replace_all(&self.source, |caps: &Captures| bindings[&caps[1]].clone())
            .into_owned())
    }
}

/// Values available to templates for one run
pub fn bindings(
    ctx: &RunContext,
    testing: &Pool,
    unstable: &Pool,
    artifacts: &RunArtifacts,
) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    let mut bind = |name: &str, value: String| {
        vars.insert(name.to_string(), value);
    };

    bind("SERIES", ctx.series.clone());
    bind("RUN_TAG", ctx.run_tag());
    bind("TESTING_DIR", testing.root.display().to_string());
    bind("UNSTABLE_DIR", unstable.root.display().to_string());
    bind("HINTS_DIR", ctx.paths.hints_dir.display().to_string());
    bind("OUTPUT_DIR", artifacts.dir.display().to_string());
    bind("HEIDI_OUTPUT", artifacts.heidi.display().to_string());
    bind("HEIDI_DELTA_OUTPUT", artifacts.delta.display().to_string());

    bind("ARCHITECTURES", ctx.architectures.join(" "));
    bind("NOBREAKALL_ARCHES", ctx.policy.nobreakall_architectures.join(" "));
    bind("BREAK_ARCHES", ctx.policy.break_architectures.join(" "));
    bind("SMOOTH_UPDATES", ctx.policy.smooth_updates.join(" "));

    let days = &ctx.policy.min_days;
    bind("MINDAYS_LOW", days.low.to_string());
    bind("MINDAYS_MEDIUM", days.medium.to_string());
    bind("MINDAYS_HIGH", days.high.to_string());
    bind("MINDAYS_CRITICAL", days.critical.to_string());
    bind("MINDAYS_EMERGENCY", days.emergency.to_string());

    let mut permission_lines = Vec::new();
    for (operator, hints) in &ctx.policy.hint_permissions {
        let key = format!("HINTS_{}", operator.to_uppercase().replace('-', "_"));
        let value = hints.join(" ");
        permission_lines.push(format!("{key:<17} = {value}"));
        bind(&key, value);
    }
    bind("HINT_PERMISSIONS", permission_lines.join("\n"));

    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolName, test_context};

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_all() {
        let template = ConfigTemplate::new("A = ${FOO}\nB = ${BAR} ${FOO}\n");
        let rendered = template
            .render(&vars(&[("FOO", "1"), ("BAR", "two")]))
            .unwrap();
        assert_eq!(rendered, "A = 1\nB = two 1\n");
    }

    #[test]
    fn test_render_fails_on_unbound() {
        let template = ConfigTemplate::new("A = ${FOO}\nB = ${MISSING}\nC = ${ALSO_MISSING}\n");
        let err = template.render(&vars(&[("FOO", "1")])).unwrap_err();

        match err {
            Error::ConfigGeneration(msg) => {
                assert!(msg.contains("ALSO_MISSING, MISSING"), "{msg}");
            }
            other => panic!("expected ConfigGeneration, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_binding_is_allowed() {
        let template = ConfigTemplate::new("BREAK_ARCHES = ${BREAK_ARCHES}\n");
        let rendered = template.render(&vars(&[("BREAK_ARCHES", "")])).unwrap();
        assert_eq!(rendered, "BREAK_ARCHES = \n");
    }

    #[test]
    fn test_builtin_template_is_fully_bound() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        ctx.policy
            .hint_permissions
            .insert("freeze".to_string(), vec!["block".to_string(), "unblock".to_string()]);
        let testing = Pool::layout(&ctx, PoolName::Testing);
        let unstable = Pool::layout(&ctx, PoolName::Unstable);
        let artifacts = RunArtifacts::for_context(&ctx);

        let vars = bindings(&ctx, &testing, &unstable, &artifacts);
        let rendered = ConfigTemplate::builtin().render(&vars).unwrap();

        assert!(rendered.contains("ARCHITECTURES     = amd64 arm64\n"));
        assert!(rendered.contains("HINTS_FREEZE      = block unblock\n"));
        assert!(rendered.contains(&format!("UNSTABLE          = {}\n", unstable.root.display())));
        assert!(!rendered.contains("${"));
        assert_eq!(vars["HINTS_FREEZE"], "block unblock");
    }
}
