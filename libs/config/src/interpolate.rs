use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
  static ref ENVIRONMENT_VARIABLE_INTERPOLATION_REGEX: Regex =
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::([^}]*))?\}")
      // @expected: static pattern, covered by tests
      .unwrap();
}

/// Replaces environment variable references in raw config contents.
///
/// - `${NAME}` is replaced with the value of `NAME`, and is an error when `NAME` is not set.
/// - `${NAME:fallback}` uses `fallback` when `NAME` is not set.
/// - `$$` is a literal `$`.
pub fn interpolate(
  input: &str,
  get_env_value: impl Fn(&str) -> Option<String>,
) -> Result<String, Vec<String>> {
  let mut errors = Vec::new();

  let interpolated = ENVIRONMENT_VARIABLE_INTERPOLATION_REGEX
    .replace_all(input, |caps: &Captures| {
      let Some(name) = caps.get(1).map(|m| m.as_str()) else {
        return "$".to_string();
      };

      match (get_env_value(name), caps.get(2)) {
        (Some(value), _) => value,
        (None, Some(fallback)) => fallback.as_str().to_string(),
        (None, None) => {
          errors.push(format!(
            "environment variable \"{}\" is referenced in the config file, but is not set",
            name
          ));
          String::new()
        }
      }
    })
    .into_owned();

  match errors.is_empty() {
    true => Ok(interpolated),
    false => Err(errors),
  }
}
