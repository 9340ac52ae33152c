use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::outfit::types::ProductListing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    Generated,
    Uploaded,
}

/// Latest design and search results for one chat.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignSession {
    pub prompt: String,
    pub design_text: String,
    pub design_image: Option<Vec<u8>>,
    pub image_origin: Option<ImageOrigin>,
    pub search_text: String,
    pub budget: u32,
    pub products: Vec<ProductListing>,
}

impl DesignSession {
    pub fn new(budget: u32) -> Self {
        DesignSession {
            prompt: String::new(),
            design_text: String::new(),
            design_image: None,
            image_origin: None,
            search_text: String::new(),
            budget,
            products: Vec::new(),
        }
    }

    /// Replaces the design with a freshly generated one. A failed render
    /// clears any earlier image, uploaded or not.
    pub fn set_design(&mut self, design_text: String, image: Option<Vec<u8>>) {
        self.design_text = design_text;
        self.image_origin = image.as_ref().map(|_| ImageOrigin::Generated);
        self.design_image = image;
    }

    pub fn set_uploaded_image(&mut self, image: Vec<u8>) {
        self.design_image = Some(image);
        self.image_origin = Some(ImageOrigin::Uploaded);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<Mutex<HashMap<i64, DesignSession>>>,
    default_budget: u32,
}

impl AppState {
    pub fn new(default_budget: u32) -> Self {
        AppState {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            default_budget,
        }
    }

    /// A copy of the chat's session, so callers can await without the lock.
    pub fn session(&self, chat_id: i64) -> DesignSession {
        self.sessions
            .lock()
            .get(&chat_id)
            .cloned()
            .unwrap_or_else(|| DesignSession::new(self.default_budget))
    }

    pub fn update_session<R>(&self, chat_id: i64, apply: impl FnOnce(&mut DesignSession) -> R) -> R {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(chat_id)
            .or_insert_with(|| DesignSession::new(self.default_budget));
        apply(session)
    }

    pub fn reset_session(&self, chat_id: i64) {
        self.sessions.lock().remove(&chat_id);
    }
}
