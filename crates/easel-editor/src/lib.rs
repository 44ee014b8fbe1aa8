pub mod app;
pub mod bus;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod handles;
pub mod history;
pub mod input;
pub mod plugin;
pub mod selector;

pub use app::{App, Editor, WeakApp};
pub use bus::{Event, EventBus, Subscription};
pub use commands::{AddCommand, Command, CommandKind, ModifyCommand, RemoveCommand, Replay};
pub use config::{AppConfig, EditorConfig, HighlightConfig, HistoryOptions, SelectorOptions, TransformerConfig};
pub use error::EditorError;
pub use geometry::OverlayRect;
pub use handles::{Anchor, TransformFrame, TransformHandles};
pub use history::{History, HistoryDestroy, HistoryPlugin};
pub use input::{Modifiers, PointerButton, PointerEvent, Target};
pub use plugin::Plugin;
pub use selector::{SelectorDestroy, SelectorInstalled, SelectorPlugin, SelectorState};
