//! ChatML prompt rendering.
//!
//! ```text
//! <|im_start|>system
//! {system prompt}
//! <|im_end|>
//! <|im_start|>{role}
//! {content}
//! <|im_end|>
//! ...
//! <|im_start|>assistant
//! ```
//!
//! The output must match this layout byte for byte; the model family is
//! trained on it.

use super::message::Message;

pub const IM_START: &str = "<|im_start|>";
pub const IM_END: &str = "<|im_end|>";

/// Sent as the single stop sequence so generation ends at the turn boundary.
pub const STOP_SEQUENCE: &str = IM_END;

/// Opens the assistant turn the model is asked to complete.
pub const ASSISTANT_TURN_START: &str = "\n<|im_start|>assistant\n";

/// Render `system` plus `messages` followed by the assistant turn marker.
pub fn render<'a, I>(system: &str, messages: I) -> String
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut out = format!("{IM_START}system\n{system}\n{IM_END}");
    for m in messages {
        out.push('\n');
        out.push_str(IM_START);
        out.push_str(m.role().as_str());
        out.push('\n');
        out.push_str(m.content());
        out.push('\n');
        out.push_str(IM_END);
    }
    out.push_str(ASSISTANT_TURN_START);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transcript_renders_system_and_marker() {
        let p = render("You are helpful.", &Vec::<Message>::new());
        assert_eq!(
            p,
            "<|im_start|>system\nYou are helpful.\n<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn messages_render_in_order() {
        let msgs = [Message::user("Hello"), Message::assistant("Hi there")];
        let p = render("S", &msgs);
        assert_eq!(
            p,
            "<|im_start|>system\nS\n<|im_end|>\n\
             <|im_start|>user\nHello\n<|im_end|>\n\
             <|im_start|>assistant\nHi there\n<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn multiline_content_is_verbatim() {
        let msgs = [Message::user("line one\nline two")];
        let p = render("", &msgs);
        assert!(p.starts_with("<|im_start|>system\n\n<|im_end|>"));
        assert!(p.contains("\nline one\nline two\n<|im_end|>"));
        assert!(p.ends_with(ASSISTANT_TURN_START));
    }
}
