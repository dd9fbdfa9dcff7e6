/// Convert a PascalCase (or camelCase) type name into snake_case.
///
/// Runs of capitals are treated as one word, so `JSONCacher` becomes
/// `json_cacher` rather than `j_s_o_n_cacher`. Generic arguments and module
/// paths are stripped first, which lets callers pass `std::any::type_name`
/// output directly.
pub fn snake_case(name: &str) -> String {
    let base = name.split('<').next().unwrap_or(name);
    let base = base.rsplit("::").next().unwrap_or(base);

    let chars: Vec<char> = base.chars().collect();
    let mut out = String::with_capacity(base.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let starts_word = match prev {
                None => false,
                Some(p) if p == '_' => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                Some(_) => false,
            };
            if starts_word {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }

    out
}
