//! Built-in handlers for the farm's env keys

mod maya;
mod nuke;
mod project;
mod renderman;
mod static_table;

pub use maya::MayaHandler;
pub use nuke::NukeHandler;
pub use project::ProjectHandler;
pub use renderman::RendermanHandler;
pub use static_table::StaticHandler;

use crate::environment::Environment;
use crate::error::HandlerError;

/// Join path segments with `/`, trimming duplicate separators
pub(crate) fn join_path(root: &str, rest: &[&str]) -> String {
    let mut out = root.trim_end_matches(['/', '\\']).to_string();
    for part in rest {
        out.push('/');
        out.push_str(part.trim_matches(['/', '\\']));
    }
    out
}

/// Replace the program in `argv` when it equals one of `names`
pub(crate) fn replace_program(argv: &[String], names: &[&str], with: impl FnOnce(&str) -> String) -> Vec<String> {
    let mut out = argv.to_vec();
    if let Some(program) = out.first_mut() {
        if names.contains(&program.as_str()) {
            *program = with(program);
        }
    }
    out
}

/// Resolve an install-root template against `env`
///
/// `{name}` placeholders are filled from `fields` first, then `$VAR`s are
/// expanded. A missing variable is fatal when `required`.
pub(crate) fn locate(
    handler: &str,
    key: &str,
    template: Option<&str>,
    fields: &[(&str, &str)],
    env: &Environment,
    required: bool,
) -> Result<Option<String>, HandlerError> {
    let Some(template) = template else {
        return if required {
            Err(HandlerError::fatal(handler, format!("no install root configured for {key}")))
        } else {
            Ok(None)
        };
    };

    let filled = fields
        .iter()
        .fold(template.to_string(), |acc, (name, value)| acc.replace(&format!("{{{name}}}"), value));

    match env.try_expand(&filled) {
        Ok(path) => Ok(Some(path)),
        Err(missing) if required => Err(HandlerError::fatal(
            handler,
            format!("required install root for {key} needs ${missing}, which is not set"),
        )),
        Err(missing) => Err(HandlerError::unresolved(handler, key, format!("${missing} is not set"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_trims_separators() {
        assert_eq!(join_path("/opt/pixar/", &["bin", "prman"]), "/opt/pixar/bin/prman");
        assert_eq!(join_path("C:\\Pixar\\", &["/bin/"]), "C:\\Pixar/bin");
    }

    #[test]
    fn locate_fills_and_expands() {
        let env: Environment = [("APPS", "/apps")].into_iter().collect();
        let found = locate("maya", "maya2016", Some("$APPS/maya{version}"), &[("version", "2016")], &env, true);
        assert_eq!(found, Ok(Some("/apps/maya2016".to_string())));
    }

    #[test]
    fn locate_classifies_missing_roots() {
        let env = Environment::new();
        let optional = locate("maya", "maya2016", Some("$APPS/maya"), &[], &env, false).unwrap_err();
        assert!(!optional.is_fatal());
        let required = locate("maya", "maya2016", Some("$APPS/maya"), &[], &env, true).unwrap_err();
        assert!(required.is_fatal());
        assert_eq!(locate("maya", "maya2016", None, &[], &env, false), Ok(None));
        assert!(locate("maya", "maya2016", None, &[], &env, true).unwrap_err().is_fatal());
    }
}
