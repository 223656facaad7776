use crate::models::{DocumentMetadata, Language};

pub const REFUSAL_ES: &str = "La información solicitada no se encuentra en los documentos que he procesado.";
pub const REFUSAL_EN: &str = "The requested information is not found in the documents I have processed.";

const REWRITE_ES: &str = "Dada una conversación y una última pregunta del usuario, reformula la \
última pregunta para que sea una pregunta autocontenida, en su idioma original. La pregunta \
debe tener todo el contexto necesario para ser entendida por sí misma. Responde únicamente con \
la pregunta reformulada, sin comentarios adicionales.";

const REWRITE_EN: &str = "Given a conversation and the user's latest question, reformulate the \
latest question into a self-contained question in its original language. The question must carry \
all the context needed to be understood on its own. Reply with the reformulated question only, \
without any extra commentary.";

const ANSWER_ES: &str = "Eres un asistente legal de alta precisión. Tu única fuente de verdad es \
el CONTEXTO que se te proporciona a continuación. Está estrictamente prohibido usar cualquier \
conocimiento externo o pre-entrenado. Responde la PREGUNTA del usuario basándote exclusivamente \
en el CONTEXTO. Si la respuesta se encuentra en el CONTEXTO, al final de cada dato DEBES citar \
tu fuente con el nombre del archivo y, cuando exista, el número de página de los metadatos. Por \
ejemplo: (Fuente: constitucion.pdf, página 15). Si la información no se encuentra en el \
CONTEXTO, debes responder EXACTAMENTE y únicamente con la frase: '{refusal}'";

const ANSWER_EN: &str = "You are a high-precision legal assistant. Your only source of truth is \
the CONTEXT given below. Using any external or pre-trained knowledge is strictly forbidden. \
Answer the user's QUESTION based exclusively on the CONTEXT. If the answer is in the CONTEXT, \
you MUST cite your source after each fact with the file name and, when present, the page number \
from the metadata. For example: (Source: constitution.pdf, page 15). If the information is not \
in the CONTEXT, you must reply EXACTLY and only with the sentence: '{refusal}'";

impl Language {
    pub fn refusal(&self) -> &'static str {
        match self {
            Language::Spanish => REFUSAL_ES,
            Language::English => REFUSAL_EN,
        }
    }

    pub fn rewrite_instruction(&self) -> &'static str {
        match self {
            Language::Spanish => REWRITE_ES,
            Language::English => REWRITE_EN,
        }
    }

    pub fn answer_instruction(&self) -> String {
        let template = match self {
            Language::Spanish => ANSWER_ES,
            Language::English => ANSWER_EN,
        };
        template.replace("{refusal}", self.refusal())
    }

    /// Citation in the form the answer instruction asks the model to use.
    pub fn citation(&self, metadata: &DocumentMetadata) -> String {
        match metadata.page {
            Some(page) => format!(
                "({}: {}, {} {})",
                self.source_label(),
                metadata.source,
                self.page_label(),
                page
            ),
            None => format!("({}: {})", self.source_label(), metadata.source),
        }
    }

    pub(crate) fn context_heading(&self) -> &'static str {
        match self {
            Language::Spanish => "CONTEXTO:",
            Language::English => "CONTEXT:",
        }
    }

    pub(crate) fn source_label(&self) -> &'static str {
        match self {
            Language::Spanish => "Fuente",
            Language::English => "Source",
        }
    }

    pub(crate) fn page_label(&self) -> &'static str {
        match self {
            Language::Spanish => "página",
            Language::English => "page",
        }
    }
}
