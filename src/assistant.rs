//! Chat with the backend assistant.

use crate::error::ApiError;
use crate::models::{AssistantReply, HistoryEntry, Role};
use pulldown_cmark::{html, Options, Parser};

pub const HISTORY_WINDOW: usize = 14;

const GREETING: &str = "Hola 👋 Soy tu asistente del dashboard.\n\n\
Puedo responder con datos reales: pendientes, en progreso, tiempos promedio, \
top colaboradores, tipos, SLA y fechas.";
const CLEARED: &str = "Listo ✅ Chat limpio.\n\n\
Puedes preguntarme por métricas del dashboard, fechas, SLA, top colaboradores y más.";
const EMPTY_REPLY: &str = "No pude responder. Intenta de nuevo.";
const BACKEND_DOWN: &str =
    "Tuve un problema consultando el backend. Verifica que el servidor esté arriba.";

pub const SUGGESTIONS: [&str; 10] = [
    "Dame un resumen del estado del dashboard.",
    "¿Cuántos tickets pendientes hay y cuántos están en progreso?",
    "Top 5 colaboradores por tickets (últimos 30 días).",
    "Distribución por tipo (últimos 30 días).",
    "Promedio de tiempo de respuesta y de atención.",
    "Backlog aging de pendientes (0–1d, 2–7d, 8–30d, +30d).",
    "Outliers: tickets con atención > 6 horas (últimos 30 días).",
    "Tickets en progreso sin check_out > 6 horas.",
    "Lista de clientes (limit 50).",
    "Lista de colaboradores (limit 50).",
];

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    fn assistant(content: &str) -> Self {
        Message {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }
}

/// A question ready to be posted.
#[derive(Clone, Debug, PartialEq)]
pub struct Outgoing {
    pub message: String,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    pending: bool,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Conversation {
            messages: vec![Message::assistant(GREETING)],
            pending: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn clear(&mut self) {
        self.messages = vec![Message::assistant(CLEARED)];
    }

    /// Records the user's message and returns what to send, or `None` when
    /// the text is blank or a reply is still outstanding.
    pub fn begin(&mut self, text: &str) -> Option<Outgoing> {
        let text = text.trim();
        if text.is_empty() || self.pending {
            return None;
        }
        self.messages.push(Message {
            role: Role::User,
            content: text.to_string(),
        });
        self.pending = true;
        Some(Outgoing {
            message: text.to_string(),
            history: self.history(HISTORY_WINDOW),
        })
    }

    pub fn finish(&mut self, result: Result<AssistantReply, ApiError>) {
        let content = match result {
            Ok(reply) => reply
                .reply
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| EMPTY_REPLY.to_string()),
            Err(err) => {
                tracing::warn!(error = %err, "assistant request failed");
                BACKEND_DOWN.to_string()
            }
        };
        self.messages.push(Message {
            role: Role::Assistant,
            content,
        });
        self.pending = false;
    }

    /// The last `max` messages in wire form.
    pub fn history(&self, max: usize) -> Vec<HistoryEntry> {
        let skip = self.messages.len().saturating_sub(max);
        self.messages[skip..]
            .iter()
            .map(|m| HistoryEntry {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

/// Markdown reply as wrapped plain text for the terminal.
pub fn markdown_to_text(markdown: &str, width: usize) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html2text::from_read(html_output.as_bytes(), width.max(10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_rejects_blank_and_concurrent_sends() {
        let mut chat = Conversation::new();
        assert_eq!(chat.begin("   "), None);

        let outgoing = chat.begin("  ¿Cuántos pendientes?  ").expect("outgoing");
        assert_eq!(outgoing.message, "¿Cuántos pendientes?");
        assert!(chat.is_pending());
        assert_eq!(chat.begin("otra"), None);
        assert_eq!(chat.messages().len(), 2);
    }

    #[test]
    fn test_history_includes_new_message_and_is_windowed() {
        let mut chat = Conversation::new();
        for i in 0..10 {
            chat.begin(&format!("pregunta {}", i)).expect("send");
            chat.finish(Ok(AssistantReply {
                reply: Some(format!("respuesta {}", i)),
                meta: None,
            }));
        }
        let outgoing = chat.begin("última").expect("send");
        assert_eq!(outgoing.history.len(), HISTORY_WINDOW);
        let last = outgoing.history.last().expect("last");
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "última");
        assert_eq!(outgoing.history[0].content, "respuesta 3");
    }

    #[test]
    fn test_empty_reply_and_errors_produce_fallback_messages() {
        let mut chat = Conversation::new();
        chat.begin("hola").expect("send");
        chat.finish(Ok(AssistantReply {
            reply: Some("  ".to_string()),
            meta: None,
        }));
        assert_eq!(chat.messages().last().map(|m| m.content.as_str()), Some(EMPTY_REPLY));
        assert!(!chat.is_pending());

        chat.begin("hola otra vez").expect("send");
        chat.finish(Err(ApiError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: String::new(),
        }));
        assert_eq!(chat.messages().last().map(|m| m.content.as_str()), Some(BACKEND_DOWN));
    }

    #[test]
    fn test_clear_resets_to_single_message() {
        let mut chat = Conversation::new();
        chat.begin("hola").expect("send");
        chat.clear();
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].role, Role::Assistant);
    }

    #[test]
    fn test_markdown_is_flattened_to_text() {
        let text = markdown_to_text("Hay **12** pendientes:\n\n- Ana: 5\n- Luis: 7\n", 60);
        assert!(text.contains("12"));
        assert!(text.contains("Ana: 5"));
        assert!(text.contains("Luis: 7"));
        assert!(!text.contains("<li>"));
    }
}
