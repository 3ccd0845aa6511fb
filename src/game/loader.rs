use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Request, RequestInit, RequestMode, Response, Window};

use crate::engine::mesh::{Mesh, VERTEX_STRIDE};
use crate::sim::assets::{AssetCompletion, AssetError, AssetLoader, AssetRequest, Visual};
use crate::sim::config::ModelConfig;

/// Completions posted by finished fetches, drained by the game each frame.
pub type Inbox = Rc<RefCell<Vec<AssetCompletion>>>;
/// Parsed meshes by model path.
pub type MeshCache = Rc<RefCell<HashMap<String, Rc<Mesh>>>>;

/// Fetches and parses `.glb` models off the frame loop.
pub struct BrowserLoader {
    window: Window,
    inbox: Inbox,
    meshes: MeshCache,
}

impl BrowserLoader {
    pub fn new(window: Window, inbox: Inbox, meshes: MeshCache) -> Self {
        BrowserLoader { window, inbox, meshes }
    }
}

impl AssetLoader for BrowserLoader {
    fn load(&mut self, request: &AssetRequest) -> Result<(), AssetError> {
        let cached = self.meshes.borrow().get(&request.model.path).cloned();
        if let Some(mesh) = cached {
            let visual = model_visual(&mesh, &request.model);
            self.inbox.borrow_mut().push(AssetCompletion { ticket: request.ticket.clone(), result: Ok(visual) });
            return Ok(());
        }

        let window = self.window.clone();
        let inbox = self.inbox.clone();
        let meshes = self.meshes.clone();
        let request = request.clone();
        spawn_local(async move {
            let path = request.model.path.clone();
            let result = fetch_bytes(&window, &path)
                .await
                .and_then(|bytes| Mesh::from_gltf(&path, &bytes))
                .map(|mut mesh| {
                    mesh.center_footprint();
                    let visual = model_visual(&mesh, &request.model);
                    debug!("loaded {} ({} vertices)", path, mesh.vertices.len() / VERTEX_STRIDE);
                    meshes.borrow_mut().insert(path.clone(), Rc::new(mesh));
                    visual
                });
            inbox.borrow_mut().push(AssetCompletion { ticket: request.ticket, result });
        });
        Ok(())
    }
}

/// World-space bounds of `mesh` drawn with `model`'s scale and lift.
fn model_visual(mesh: &Mesh, model: &ModelConfig) -> Visual {
    let (min, max) = mesh.bounds();
    let size = (max - min) * model.scale;
    let base = min.y * model.scale + model.position_offset_y;
    Visual::model(&model.path, size, base)
}

async fn fetch_bytes(window: &Window, path: &str) -> Result<Vec<u8>, AssetError> {
    let fetch_error = |reason: String| AssetError::Fetch { path: path.to_string(), reason };

    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);
    let request = Request::new_with_str_and_init(path, &opts).map_err(|e| fetch_error(format!("{:?}", e)))?;

    let response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| fetch_error(format!("{:?}", e)))?;
    let response: Response = response.dyn_into().map_err(|e| fetch_error(format!("{:?}", e)))?;
    if !response.ok() {
        return Err(AssetError::Status { path: path.to_string(), status: response.status() });
    }

    let buffer = response.array_buffer().map_err(|e| fetch_error(format!("{:?}", e)))?;
    let buffer = JsFuture::from(buffer).await.map_err(|e| fetch_error(format!("{:?}", e)))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}
