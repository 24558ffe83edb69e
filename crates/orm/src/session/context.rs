//! Explicit "current session" holder
//!
//! Callers pass a [`SessionContext`] to
//! [`SessionFactory::current_session`](super::SessionFactory::current_session)
//! wherever one unit of work spans several calls.

use super::Session;

#[derive(Debug, Default)]
pub struct SessionContext {
    pub(crate) session: Option<Session>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The held session, if it is still open
    pub fn current(&mut self) -> Option<&mut Session> {
        self.session.as_mut().filter(|session| session.is_open())
    }

    pub fn has_session(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_open)
    }

    /// Detach the held session without closing it
    pub fn take(&mut self) -> Option<Session> {
        self.session.take()
    }

    /// Close and forget the held session
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}
