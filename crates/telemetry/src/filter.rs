//! Glob filter matching for watch registration.
//!
//! A filter is one of: empty or `"*"` (match everything), `"prefix*"`
//! (prefix match), or an exact id. `Queue` additionally accepts a
//! `"type:id"` form, each side independently subject to the same rules.

/// `""`, `"*"`, `"prefix*"`, or an exact match against `id`.
pub fn match_glob(filter: &str, id: &str) -> bool {
    if filter.is_empty() || filter == "*" {
        return true;
    }
    if let Some(prefix) = filter.strip_suffix('*') {
        return id.starts_with(prefix);
    }
    filter == id
}

/// Like [`match_glob`], but a bare numeric filter also matches `tid`
/// directly.
pub fn match_thread(filter: &str, name: &str, tid: u32) -> bool {
    if filter.is_empty() || filter == "*" {
        return true;
    }
    if let Some(prefix) = filter.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    if filter == name {
        return true;
    }
    filter.parse::<u32>().map(|f| f == tid).unwrap_or(false)
}

/// Queue filters additionally accept `"type:id"`, `"type:"`, `"type:*"`,
/// `":id"`, `":"`/`"*:*"` — either side may be glob/empty/`*`.
pub fn match_queue(filter: &str, queue_type: &str, id: &str) -> bool {
    if filter.is_empty() || filter == "*" {
        return true;
    }
    if let Some((type_part, id_part)) = filter.split_once(':') {
        if !(type_part.is_empty() || type_part == "*") && type_part != queue_type {
            return false;
        }
        return match_glob(id_part, id);
    }
    match_glob(filter, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_star_match_anything() {
        assert!(match_glob("", "anything"));
        assert!(match_glob("*", "anything"));
    }

    #[test]
    fn prefix_glob() {
        assert!(match_glob("order*", "orders_table"));
        assert!(!match_glob("order*", "other_table"));
    }

    #[test]
    fn exact_match_only() {
        assert!(match_glob("heap_a", "heap_a"));
        assert!(!match_glob("heap_a", "heap_b"));
    }

    #[test]
    fn thread_filter_matches_numeric_tid() {
        assert!(match_thread("7", "worker", 7));
        assert!(!match_thread("7", "worker", 8));
        assert!(match_thread("work*", "worker", 7));
    }

    #[test]
    fn queue_filter_type_and_id() {
        assert!(match_queue("ipc:orders", "ipc", "orders"));
        assert!(!match_queue("ipc:orders", "rx", "orders"));
        assert!(match_queue("ipc:*", "ipc", "anything"));
        assert!(match_queue(":orders", "ipc", "orders"));
        assert!(match_queue("*:*", "ipc", "orders"));
        assert!(match_queue("orders", "ipc", "orders"));
    }
}
