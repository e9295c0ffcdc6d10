//! Which screen is active, and which list is in focus.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Landing,
    Auth,
    Dashboard,
    ListDetail { list_id: String },
}

/// View state machine.
///
/// Starts on `Landing` with `loading` set until the first session resolution.
/// Actions that do not apply to the current view are ignored and return
/// `false`.
#[derive(Debug, Clone)]
pub struct ViewRouter {
    view: View,
    resolved: bool,
}

impl Default for ViewRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRouter {
    pub fn new() -> Self {
        Self {
            view: View::Landing,
            resolved: false,
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// True until the first session resolution; nothing should render.
    pub fn is_loading(&self) -> bool {
        !self.resolved
    }

    pub fn focused_list(&self) -> Option<&str> {
        match &self.view {
            View::ListDetail { list_id } => Some(list_id.as_str()),
            _ => None,
        }
    }

    /// `landing → auth`
    pub fn start(&mut self) -> bool {
        self.transition(View::Landing, View::Auth)
    }

    /// `auth → landing`
    pub fn cancel(&mut self) -> bool {
        self.transition(View::Auth, View::Landing)
    }

    /// Any view goes to `dashboard` when signed in, `landing` otherwise.
    pub fn session_resolved(&mut self, signed_in: bool) {
        self.resolved = true;
        self.view = if signed_in {
            View::Dashboard
        } else {
            View::Landing
        };
    }

    /// `dashboard → list_detail(list_id)`
    pub fn select_list(&mut self, list_id: &str) -> bool {
        self.transition(
            View::Dashboard,
            View::ListDetail {
                list_id: list_id.to_string(),
            },
        )
    }

    /// `list_detail → dashboard`
    pub fn back(&mut self) -> bool {
        if matches!(self.view, View::ListDetail { .. }) {
            self.view = View::Dashboard;
            true
        } else {
            false
        }
    }

    fn transition(&mut self, from: View, to: View) -> bool {
        if self.view == from {
            self.view = to;
            true
        } else {
            false
        }
    }
}
