//! In-container command line construction.

/// Build `<interpreter> <script>` followed by `arguments` joined with single
/// spaces.
///
/// Arguments are appended verbatim: no quoting or escaping is applied, so the
/// container shell sees them exactly as given.
#[must_use]
pub fn build_command_line(interpreter: &str, script: &str, arguments: &[String]) -> String {
    let mut command = format!("{interpreter} {script}");
    if !arguments.is_empty() {
        command.push(' ');
        command.push_str(&arguments.join(" "));
    }
    command
}
