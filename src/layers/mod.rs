/// Layer composition
///
/// Descriptors (game thread) reconcile into render layers (render thread),
/// which own the texture rings submitted to the VR runtime.

pub mod descriptor;
pub mod error;
pub mod manager;
pub mod render_layer;
pub mod texture_set;

pub use descriptor::{LayerChanges, LayerDesc, LayerId, LayerKind, LayerOrigin, TextureSource};
pub use error::{LayerErrorContext, LayerResult};
pub use manager::LayerManager;
pub use render_layer::RenderLayer;
pub use texture_set::{RuntimeTextureSetFactory, TextureSetDesc, TextureSetFactory, TextureSetProxy};
