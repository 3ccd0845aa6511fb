use nalgebra::{Matrix4, Vector3};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, WebGlBuffer, WebGlProgram, WebGlRenderingContext, WebGlUniformLocation};

use crate::engine::mesh::{Mesh, VERTEX_STRIDE};
use crate::sim::environment::{rgb, Fog};

type GL = WebGlRenderingContext;

const STRIDE_BYTES: i32 = (VERTEX_STRIDE * 4) as i32;

const VERTEX_SHADER: &str = r#"
    attribute vec3 aPosition;
    attribute vec3 aColor;
    attribute vec2 aTexCoord;
    uniform mat4 uModel;
    uniform mat4 uView;
    uniform mat4 uProjection;
    uniform float uPointSize;
    varying vec3 vColor;
    varying vec2 vTexCoord;
    varying vec3 vPos;
    varying float vDepth;
    void main() {
        vec4 viewPos = uView * uModel * vec4(aPosition, 1.0);
        gl_Position = uProjection * viewPos;
        gl_PointSize = uPointSize;
        vPos = aPosition;
        vColor = aColor;
        vTexCoord = aTexCoord;
        vDepth = length(viewPos.xyz);
    }
"#;

const FRAGMENT_SHADER: &str = r#"
    precision mediump float;
    varying vec3 vColor;
    varying vec2 vTexCoord;
    varying vec3 vPos;
    varying float vDepth;
    uniform vec3 uUniformColor;
    uniform bool uUseUniformColor;
    uniform vec3 uTint;
    uniform vec3 uFogColor;
    uniform float uFogNear;
    uniform float uFogFar;
    uniform float uAlpha;
    uniform float uGrain;
    uniform float uRgbShift;
    uniform float uTime;

    void main() {
        vec3 color = uUseUniformColor ? uUniformColor : vColor;
        color *= uTint;

        // Darker toward the bottom of each shape
        float ao = smoothstep(-0.5, 0.5, vPos.y + 0.5);
        color *= mix(0.7, 1.0, ao);

        // Channel split grows toward the screen edges
        float edge = gl_FragCoord.x / 800.0 - 0.5;
        color.r *= 1.0 + uRgbShift * 100.0 * edge;
        color.b *= 1.0 - uRgbShift * 100.0 * edge;

        float noise = fract(sin(dot(gl_FragCoord.xy + uTime, vec2(12.9898, 78.233))) * 43758.5453);
        color += (noise - 0.5) * uGrain;

        float fog = smoothstep(uFogNear, uFogFar, vDepth);
        color = mix(color, uFogColor, fog);

        gl_FragColor = vec4(color, uAlpha);
    }
"#;

/// A mesh uploaded once and drawn many times.
pub struct GpuMesh {
    vertex_buffer: WebGlBuffer,
    index_buffer: WebGlBuffer,
    index_count: i32,
}

struct Uniforms {
    model: WebGlUniformLocation,
    view: WebGlUniformLocation,
    projection: WebGlUniformLocation,
    point_size: WebGlUniformLocation,
    uniform_color: WebGlUniformLocation,
    use_uniform_color: WebGlUniformLocation,
    tint: WebGlUniformLocation,
    fog_color: WebGlUniformLocation,
    fog_near: WebGlUniformLocation,
    fog_far: WebGlUniformLocation,
    alpha: WebGlUniformLocation,
    grain: WebGlUniformLocation,
    rgb_shift: WebGlUniformLocation,
    time: WebGlUniformLocation,
}

impl Uniforms {
    fn locate(gl: &GL, program: &WebGlProgram) -> Result<Self, JsValue> {
        let find = |name: &str| {
            gl.get_uniform_location(program, name)
                .ok_or_else(|| JsValue::from_str(&format!("Failed to get {} location", name)))
        };
        Ok(Uniforms {
            model: find("uModel")?,
            view: find("uView")?,
            projection: find("uProjection")?,
            point_size: find("uPointSize")?,
            uniform_color: find("uUniformColor")?,
            use_uniform_color: find("uUseUniformColor")?,
            tint: find("uTint")?,
            fog_color: find("uFogColor")?,
            fog_near: find("uFogNear")?,
            fog_far: find("uFogFar")?,
            alpha: find("uAlpha")?,
            grain: find("uGrain")?,
            rgb_shift: find("uRgbShift")?,
            time: find("uTime")?,
        })
    }
}

pub struct Renderer {
    pub gl: GL,
    uniforms: Uniforms,
    position_attrib: u32,
    color_attrib: u32,
    tex_attrib: u32,
    unit_cube: GpuMesh,
    dynamic_buffer: WebGlBuffer,
}

impl Renderer {
    pub fn new(gl: GL) -> Result<Self, JsValue> {
        let program = create_program(&gl)?;
        gl.use_program(Some(&program));

        let uniforms = Uniforms::locate(&gl, &program)?;
        let position_attrib = gl.get_attrib_location(&program, "aPosition") as u32;
        let color_attrib = gl.get_attrib_location(&program, "aColor") as u32;
        let tex_attrib = gl.get_attrib_location(&program, "aTexCoord") as u32;
        let dynamic_buffer = gl.create_buffer().ok_or("Failed to create buffer")?;
        let unit_cube = upload(&gl, &Mesh::cube(1.0, 1.0, 1.0))?;

        gl.uniform3f(Some(&uniforms.tint), 1.0, 1.0, 1.0);
        gl.uniform1f(Some(&uniforms.alpha), 1.0);
        gl.uniform1f(Some(&uniforms.point_size), 1.0);
        gl.uniform1f(Some(&uniforms.fog_near), 1.0e4);
        gl.uniform1f(Some(&uniforms.fog_far), 2.0e4);

        Ok(Renderer {
            gl,
            uniforms,
            position_attrib,
            color_attrib,
            tex_attrib,
            unit_cube,
            dynamic_buffer,
        })
    }

    pub fn upload_mesh(&self, mesh: &Mesh) -> Result<GpuMesh, JsValue> {
        upload(&self.gl, mesh)
    }

    pub fn clear(&self, color: u32) {
        let (r, g, b) = rgb(color);
        self.gl.clear_color(r, g, b, 1.0);
        self.gl.clear(GL::COLOR_BUFFER_BIT | GL::DEPTH_BUFFER_BIT);
    }

    /// Multiplies every drawn color; carries sun strength and exposure.
    pub fn set_tint(&self, r: f32, g: f32, b: f32) {
        self.gl.uniform3f(Some(&self.uniforms.tint), r, g, b);
    }

    pub fn set_fog(&self, fog: &Fog) {
        let (r, g, b) = rgb(fog.color);
        self.gl.uniform3f(Some(&self.uniforms.fog_color), r, g, b);
        self.gl.uniform1f(Some(&self.uniforms.fog_near), fog.near);
        self.gl.uniform1f(Some(&self.uniforms.fog_far), fog.far);
    }

    pub fn set_film(&self, grain: f32, rgb_shift: f32, time: f32) {
        self.gl.uniform1f(Some(&self.uniforms.grain), grain);
        self.gl.uniform1f(Some(&self.uniforms.rgb_shift), rgb_shift);
        self.gl.uniform1f(Some(&self.uniforms.time), time);
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.gl.uniform1f(Some(&self.uniforms.alpha), alpha);
    }

    pub fn enable_depth_test(&self) {
        self.gl.enable(GL::DEPTH_TEST);
    }

    pub fn enable_blend(&self) {
        self.gl.enable(GL::BLEND);
        self.gl.blend_func(GL::SRC_ALPHA, GL::ONE_MINUS_SRC_ALPHA);
    }

    pub fn resize(&self, width: i32, height: i32) {
        self.gl.viewport(0, 0, width, height);
    }

    pub fn canvas(&self) -> Option<HtmlCanvasElement> {
        self.gl.canvas()?.dyn_into::<HtmlCanvasElement>().ok()
    }

    pub fn set_camera(&self, projection: &Matrix4<f32>, view: &Matrix4<f32>) {
        self.gl.uniform_matrix4fv_with_f32_array(Some(&self.uniforms.projection), false, projection.as_slice());
        self.gl.uniform_matrix4fv_with_f32_array(Some(&self.uniforms.view), false, view.as_slice());
    }

    /// Solid box centered on `center`.
    pub fn draw_cube(&self, center: Vector3<f32>, size: Vector3<f32>, color: u32) {
        let model = Matrix4::new_translation(&center) * Matrix4::new_nonuniform_scaling(&size);
        self.use_color(Some(color));
        self.draw_indexed(&self.unit_cube, &model);
    }

    pub fn draw_mesh(&self, mesh: &GpuMesh, position: Vector3<f32>, scale: f32, rotation_y: f32) {
        let model = Matrix4::new_translation(&position)
            * Matrix4::from_euler_angles(0.0, rotation_y, 0.0)
            * Matrix4::new_scaling(scale);
        self.use_color(None);
        self.draw_indexed(mesh, &model);
    }

    /// Draws `points` (packed xyz) offset by `origin`.
    pub fn draw_points(&self, points: &[f32], origin: Vector3<f32>, color: u32, size: f32) {
        self.gl.uniform1f(Some(&self.uniforms.point_size), size);
        self.draw_positions(points, origin, color, GL::POINTS);
        self.gl.uniform1f(Some(&self.uniforms.point_size), 1.0);
    }

    /// Draws separate segments; `vertices` holds xyz pairs.
    pub fn draw_lines(&self, vertices: &[f32], origin: Vector3<f32>, color: u32) {
        self.draw_positions(vertices, origin, color, GL::LINES);
    }

    fn use_color(&self, color: Option<u32>) {
        match color {
            Some(color) => {
                let (r, g, b) = rgb(color);
                self.gl.uniform1i(Some(&self.uniforms.use_uniform_color), 1);
                self.gl.uniform3f(Some(&self.uniforms.uniform_color), r, g, b);
            }
            None => self.gl.uniform1i(Some(&self.uniforms.use_uniform_color), 0),
        }
    }

    fn draw_indexed(&self, mesh: &GpuMesh, model: &Matrix4<f32>) {
        self.gl.bind_buffer(GL::ARRAY_BUFFER, Some(&mesh.vertex_buffer));
        self.gl.bind_buffer(GL::ELEMENT_ARRAY_BUFFER, Some(&mesh.index_buffer));

        self.gl.vertex_attrib_pointer_with_i32(self.position_attrib, 3, GL::FLOAT, false, STRIDE_BYTES, 0);
        self.gl.enable_vertex_attrib_array(self.position_attrib);
        self.gl.vertex_attrib_pointer_with_i32(self.color_attrib, 3, GL::FLOAT, false, STRIDE_BYTES, 12);
        self.gl.enable_vertex_attrib_array(self.color_attrib);
        self.gl.vertex_attrib_pointer_with_i32(self.tex_attrib, 2, GL::FLOAT, false, STRIDE_BYTES, 24);
        self.gl.enable_vertex_attrib_array(self.tex_attrib);

        self.gl.uniform_matrix4fv_with_f32_array(Some(&self.uniforms.model), false, model.as_slice());
        self.gl.draw_elements_with_i32(GL::TRIANGLES, mesh.index_count, GL::UNSIGNED_SHORT, 0);
    }

    fn draw_positions(&self, vertices: &[f32], origin: Vector3<f32>, color: u32, mode: u32) {
        self.gl.bind_buffer(GL::ARRAY_BUFFER, Some(&self.dynamic_buffer));
        // SAFETY: the view is consumed by buffer_data before any allocation.
        unsafe {
            let array = js_sys::Float32Array::view(vertices);
            self.gl.buffer_data_with_array_buffer_view(GL::ARRAY_BUFFER, &array, GL::DYNAMIC_DRAW);
        }

        self.gl.vertex_attrib_pointer_with_i32(self.position_attrib, 3, GL::FLOAT, false, 0, 0);
        self.gl.enable_vertex_attrib_array(self.position_attrib);
        self.gl.disable_vertex_attrib_array(self.color_attrib);
        self.gl.disable_vertex_attrib_array(self.tex_attrib);

        self.use_color(Some(color));
        let model = Matrix4::new_translation(&origin);
        self.gl.uniform_matrix4fv_with_f32_array(Some(&self.uniforms.model), false, model.as_slice());
        self.gl.draw_arrays(mode, 0, (vertices.len() / 3) as i32);
    }
}

fn upload(gl: &GL, mesh: &Mesh) -> Result<GpuMesh, JsValue> {
    let vertex_buffer = gl.create_buffer().ok_or("Failed to create vertex buffer")?;
    let index_buffer = gl.create_buffer().ok_or("Failed to create index buffer")?;

    gl.bind_buffer(GL::ARRAY_BUFFER, Some(&vertex_buffer));
    unsafe {
        let array = js_sys::Float32Array::view(&mesh.vertices);
        gl.buffer_data_with_array_buffer_view(GL::ARRAY_BUFFER, &array, GL::STATIC_DRAW);
    }

    gl.bind_buffer(GL::ELEMENT_ARRAY_BUFFER, Some(&index_buffer));
    unsafe {
        let array = js_sys::Uint16Array::view(&mesh.indices);
        gl.buffer_data_with_array_buffer_view(GL::ELEMENT_ARRAY_BUFFER, &array, GL::STATIC_DRAW);
    }

    Ok(GpuMesh { vertex_buffer, index_buffer, index_count: mesh.indices.len() as i32 })
}

fn create_program(gl: &GL) -> Result<WebGlProgram, JsValue> {
    let vert_shader = compile_shader(gl, GL::VERTEX_SHADER, VERTEX_SHADER)?;
    let frag_shader = compile_shader(gl, GL::FRAGMENT_SHADER, FRAGMENT_SHADER)?;

    let program = gl.create_program().ok_or("Unable to create program")?;
    gl.attach_shader(&program, &vert_shader);
    gl.attach_shader(&program, &frag_shader);
    gl.link_program(&program);

    if gl.get_program_parameter(&program, GL::LINK_STATUS).as_bool().unwrap_or(false) {
        Ok(program)
    } else {
        Err(JsValue::from_str(&gl.get_program_info_log(&program).unwrap_or_default()))
    }
}

fn compile_shader(gl: &GL, shader_type: u32, source: &str) -> Result<web_sys::WebGlShader, JsValue> {
    let shader = gl.create_shader(shader_type).ok_or("Unable to create shader")?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);

    if gl.get_shader_parameter(&shader, GL::COMPILE_STATUS).as_bool().unwrap_or(false) {
        Ok(shader)
    } else {
        Err(JsValue::from_str(&gl.get_shader_info_log(&shader).unwrap_or_default()))
    }
}
