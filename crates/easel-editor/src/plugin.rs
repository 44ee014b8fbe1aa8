use crate::app::App;
use crate::error::EditorError;

/// An engine that attaches to a session through the event bus.
///
/// Plugins are handles with interior state, so every method takes `&self`.
/// `install` is called once by [`App::use_plugin`]; `dispose` detaches every
/// subscription the plugin made.
pub trait Plugin {
    /// Unique name; a second plugin with the same name is not installed.
    fn name(&self) -> &'static str;

    fn install(&self, app: &App) -> Result<(), EditorError>;

    fn dispose(&self);

    fn enable(&self);

    fn disable(&self);

    fn is_enabled(&self) -> bool;
}
