/// What a recognized flag does to the record being decoded.
pub(crate) enum Action<T> {
    /// Flag stands alone
    Switch(fn(&mut T)),
    /// Flag takes the following token, `None` when it is missing
    Value(fn(&mut T, Option<&str>)),
}

/// One entry of a flag table: every spelling maps to the same action.
pub(crate) struct Flag<T> {
    pub spellings: &'static [&'static str],
    pub action: Action<T>,
}

/// Walks a token stream, applying the action of each recognized flag.
/// Unrecognized tokens are skipped. A value is only consumed when the
/// next token is not itself a flag, so `-p -M x` reads as `-p` with no value.
pub(crate) fn scan<T>(tokens: &[&str], table: &[Flag<T>], target: &mut T) {
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        i += 1;

        let Some(flag) = table.iter().find(|flag| flag.spellings.contains(&token)) else {
            continue;
        };

        match flag.action {
            Action::Switch(apply) => apply(target),
            Action::Value(apply) => {
                let value = tokens.get(i).copied().filter(|value| !is_flag(value));
                if value.is_some() {
                    i += 1;
                }
                apply(target, value);
            }
        }
    }
}

fn is_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}
