/// Values substituted into arrival message templates.
#[derive(Clone, Debug, Default)]
pub struct MessageTokens {
    pub player: String,
    pub to_gate: String,
    pub to_world: String,
    pub to_server: String,
    pub from_gate: String,
    pub from_world: String,
    pub from_server: String,
}

impl MessageTokens {
    fn value(&self, token: &str) -> Option<&str> {
        let value = match token {
            "player" => &self.player,
            "toGate" => &self.to_gate,
            "toWorld" => &self.to_world,
            "toServer" => &self.to_server,
            "fromGate" => &self.from_gate,
            "fromWorld" => &self.from_world,
            "fromServer" => &self.from_server,
            _ => return None,
        };
        Some(value)
    }
}

/// Replaces `%token%` placeholders. Unknown tokens are left as written.
pub fn format_message(template: &str, tokens: &MessageTokens) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('%') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => match tokens.value(&after[..end]) {
                Some(value) => {
                    output.push_str(value);
                    rest = &after[end + 1..];
                }
                None => {
                    output.push('%');
                    rest = after;
                }
            },
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}
