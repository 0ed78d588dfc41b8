//! Linux variant: user+mount namespace isolation via `unshare`(1).
//!
//! The invoking uid/gid are mapped to root inside the namespace without
//! granting any host privilege. This remaps identity only; it does not
//! restrict where the child may write.

pub(crate) fn wrap(program: &str, args: &[String]) -> (String, Vec<String>) {
    let mut wrapped = vec![
        "--user".to_string(),
        "--map-root-user".to_string(),
        "--mount".to_string(),
        "--".to_string(),
        program.to_string(),
    ];
    wrapped.extend(args.iter().cloned());
    ("unshare".to_string(), wrapped)
}

#[cfg(test)]
mod tests {
    use super::wrap;

    #[test]
    fn wrap_prefixes_namespace_flags() {
        let (program, args) = wrap("sh", &["-c".to_string(), "id".to_string()]);
        assert_eq!(program, "unshare");
        assert_eq!(args, vec!["--user", "--map-root-user", "--mount", "--", "sh", "-c", "id"]);
    }

    #[test]
    fn wrap_keeps_argument_order_after_separator() {
        let (_, args) = wrap("npm", &["install".to_string(), "-g".to_string()]);
        let separator = args.iter().position(|arg| arg == "--").expect("must have separator");
        assert_eq!(&args[separator + 1..], ["npm", "install", "-g"]);
    }
}
