//! Backend folder path and mount option resolution.
//!
//! Pure functions: the same claim identity and policy always resolve to the
//! same folder and the same option list.

use std::collections::HashMap;

/// Storage class parameter overriding the configured default share.
pub const PARAM_SHARE_NAME: &str = "shareName";
/// Storage class parameter whose mere presence drops the process-wide
/// default mount options.
pub const PARAM_NO_DEFAULT_MOUNT_OPTIONS: &str = "noDefaultMountOptions";

/// Pick the share a volume's folder is created in.
pub fn resolve_share<'a>(
    parameters: &'a HashMap<String, String>,
    default_share: &'a str,
) -> &'a str {
    match parameters.get(PARAM_SHARE_NAME) {
        Some(share) if !share.is_empty() => share.as_str(),
        _ => default_share,
    }
}

/// Compose the backend folder path `/<share>/<namespace>_<claim>_<volume>`.
///
/// The volume name is unique per provisioning attempt, so two claims with the
/// same name in different namespaces, or two attempts for the same claim,
/// never share a folder.
pub fn resolve_path(
    share_override: Option<&str>,
    namespace: &str,
    claim_name: &str,
    volume_name: &str,
    default_share: &str,
) -> String {
    let share = share_override
        .filter(|s| !s.is_empty())
        .unwrap_or(default_share);
    format!("/{share}/{namespace}_{claim_name}_{volume_name}")
}

/// Build the effective mount option list.
///
/// Process defaults come first unless the storage class sets
/// [`PARAM_NO_DEFAULT_MOUNT_OPTIONS`]; storage class options follow in order.
/// Duplicates are kept: conflicting flags are resolved by the mount layer.
pub fn resolve_mount_options(
    parameters: &HashMap<String, String>,
    class_options: &[String],
    default_options: &[String],
) -> Vec<String> {
    let mut options = Vec::with_capacity(default_options.len() + class_options.len());
    if !parameters.contains_key(PARAM_NO_DEFAULT_MOUNT_OPTIONS) {
        options.extend_from_slice(default_options);
    }
    options.extend_from_slice(class_options);
    options
}

/// Split a colon-separated option string as found in `QNAP_MOUNTOPTIONS`.
pub fn split_mount_options(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(':').map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn path_uses_default_share() {
        let path = resolve_path(None, "default", "data-claim", "pvc-123", "k8s");
        assert_eq!(path, "/k8s/default_data-claim_pvc-123");
    }

    #[test]
    fn path_prefers_non_empty_override() {
        assert_eq!(
            resolve_path(Some("fast"), "ns", "c", "v", "k8s"),
            "/fast/ns_c_v"
        );
        assert_eq!(resolve_path(Some(""), "ns", "c", "v", "k8s"), "/k8s/ns_c_v");
    }

    #[test]
    fn path_is_deterministic() {
        let a = resolve_path(None, "team-a", "db", "pvc-1", "k8s");
        let b = resolve_path(None, "team-a", "db", "pvc-1", "k8s");
        assert_eq!(a, b);
    }

    #[test]
    fn path_distinct_when_two_components_collide() {
        let base = resolve_path(None, "ns", "claim", "pvc-1", "k8s");
        // Same claim and volume name, different namespace.
        assert_ne!(base, resolve_path(None, "other", "claim", "pvc-1", "k8s"));
        // Same namespace and volume name, different claim.
        assert_ne!(base, resolve_path(None, "ns", "other", "pvc-1", "k8s"));
        // Same namespace and claim, retried with a new volume name.
        assert_ne!(base, resolve_path(None, "ns", "claim", "pvc-2", "k8s"));
    }

    #[test]
    fn share_resolution() {
        let mut params = HashMap::new();
        assert_eq!(resolve_share(&params, "k8s"), "k8s");
        params.insert(PARAM_SHARE_NAME.to_owned(), String::new());
        assert_eq!(resolve_share(&params, "k8s"), "k8s");
        params.insert(PARAM_SHARE_NAME.to_owned(), "media".to_owned());
        assert_eq!(resolve_share(&params, "k8s"), "media");
    }

    #[test]
    fn defaults_precede_class_options() {
        let options = resolve_mount_options(
            &HashMap::new(),
            &strings(&["nfsvers=4"]),
            &strings(&["ro", "hard"]),
        );
        assert_eq!(options, ["ro", "hard", "nfsvers=4"]);
    }

    #[test]
    fn presence_flag_suppresses_defaults() {
        let params = HashMap::from([(PARAM_NO_DEFAULT_MOUNT_OPTIONS.to_owned(), String::new())]);
        let options =
            resolve_mount_options(&params, &strings(&["nfsvers=4"]), &strings(&["ro", "hard"]));
        assert_eq!(options, ["nfsvers=4"]);
    }

    #[test]
    fn duplicates_are_preserved() {
        let options =
            resolve_mount_options(&HashMap::new(), &strings(&["hard"]), &strings(&["hard"]));
        assert_eq!(options, ["hard", "hard"]);
    }

    #[test]
    fn split_handles_empty_and_single() {
        assert!(split_mount_options("").is_empty());
        assert_eq!(split_mount_options("hard"), ["hard"]);
        assert_eq!(split_mount_options("ro:hard"), ["ro", "hard"]);
    }
}
