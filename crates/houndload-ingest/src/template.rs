//! Cypher statement templating
//!
//! Transformers build their statements from a handful of templates whose
//! labels and relationship types vary per group. Values never go through here;
//! they are bound as `$props` parameters.

/// Replace each `{}` with the next argument, or with nothing once the
/// arguments run out
pub fn format_template(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        if let Some(arg) = args.next() {
            out.push_str(arg);
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

/// Replace every `{0}`, `{1}`, ... with the argument at that index
pub fn format_indexed(template: &str, args: &[&str]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |acc, (i, arg)| {
            acc.replace(&format!("{{{}}}", i), arg)
        })
}
