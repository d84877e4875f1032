pub mod frontend;
pub mod view;

pub use frontend::{UserInputEvent, Viewport};
pub use view::ChatView;
