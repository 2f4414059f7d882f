//! Typed TGSI-style shader IR: the token stream the guest driver emits and
//! this crate's translator (`translate.rs`) walks in a single pass.
//!
//! This is not a parser for the textual TGSI dump the original C sources
//! read with `tgsi_text_translate` — the host protocol here hands the
//! decoder an already-tokenized stream (see `decoder.rs`'s `CREATE_OBJECT`
//! shader handler), so this module only needs the in-memory token shapes.

/// Which shader stage a token stream was declared for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Processor {
    Vertex,
    Geometry,
    Fragment,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BaseType {
    F32,
    I32,
    U32,
}

/// Register file a source/destination operand lives in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum File {
    Input,
    Output,
    Temp,
    Const,
    Immediate,
    Sampler,
    SystemValue,
    Address,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Semantic {
    Position,
    Color,
    BackColor,
    Face,
    PointSize,
    ClipDistance,
    ClipVertex,
    PrimId,
    Layer,
    Generic,
    Fog,
    TexCoord,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct Swizzle {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub w: u8,
}

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle { x: 0, y: 1, z: 2, w: 3 };

    pub fn component(self, i: usize) -> u8 {
        match i {
            0 => self.x,
            1 => self.y,
            2 => self.z,
            _ => self.w,
        }
    }

    /// Renders as a GLSL swizzle suffix, e.g. `.xyz`, or `""` for identity
    /// full-width access.
    pub fn as_glsl_suffix(self, write_mask: u8) -> String {
        const LETTERS: [char; 4] = ['x', 'y', 'z', 'w'];
        let mut s = String::new();
        for i in 0..4 {
            if write_mask & (1 << i) != 0 {
                s.push(LETTERS[self.component(i) as usize]);
            }
        }
        s
    }
}

/// Declaration of one contiguous register range in a file.
#[derive(Clone, Debug)]
pub struct Declaration {
    pub file: File,
    pub first: u32,
    pub last: u32,
    pub semantic: Option<(Semantic, u32)>,
    pub interpolation: Interpolation,
    /// UBO array declarations carry (array_id, size) in the `Const` file.
    pub array_id: Option<u32>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Interpolation {
    Constant,
    Linear,
    Perspective,
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Perspective
    }
}

#[derive(Clone, Debug)]
pub struct Immediate {
    pub value: [u32; 4],
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    Mov,
    Add,
    Sub,
    Mul,
    Mad,
    Div,
    Dp2,
    Dp3,
    Dp4,
    Dph,
    Min,
    Max,
    Abs,
    Sqrt,
    Rsq,
    Rcp,
    Lrp,
    Frc,
    Flr,
    Ceil,
    Trunc,
    Round,
    Ssg,
    And,
    Or,
    Xor,
    Shl,
    Ishr,
    Tex,
    Txb,
    Txl,
    Txd,
    Txf,
    Txp,
    Txq,
    Tex2,
    Txb2,
    Txl2,
    If,
    Uif,
    Else,
    Endif,
    BgnLoop,
    EndLoop,
    Brk,
    Ret,
    Kill,
    KillIf,
    End,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TextureTarget {
    D1,
    D2,
    D3,
    Cube,
    D1Array,
    D2Array,
    CubeArray,
    Rect,
    Buffer,
    D2Multisample,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct SrcModifiers {
    pub negate: bool,
    pub absolute: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct SrcOperand {
    pub file: File,
    pub index: u32,
    pub swizzle: Swizzle,
    pub modifiers: SrcModifiers,
    pub src_type: BaseType,
}

#[derive(Copy, Clone, Debug)]
pub struct DstOperand {
    pub file: File,
    pub index: u32,
    pub write_mask: u8,
    pub dst_type: BaseType,
    pub saturate: bool,
}

#[derive(Clone, Debug)]
pub struct Instruction {
    pub opcode: Opcode,
    pub dst: Option<DstOperand>,
    pub src: Vec<SrcOperand>,
    /// Sampler index for texture opcodes, plus the addressing target.
    pub texture: Option<(u32, TextureTarget, bool /* shadow */)>,
}

/// A complete, already-tokenized shader program for one stage.
#[derive(Clone, Debug, Default)]
pub struct TokenStream {
    pub declarations: Vec<Declaration>,
    pub immediates: Vec<Immediate>,
    pub instructions: Vec<Instruction>,
    /// Streamout layout declared alongside the shader (§3 "Shader
    /// selector"); empty when the shader has no transform-feedback outputs.
    pub stream_output: Vec<StreamOutputEntry>,
    /// `true` when the fragment shader must broadcast to `fsout_c1..7`
    /// (the "write-all-cbufs" property in §4.C).
    pub write_all_cbufs: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct StreamOutputEntry {
    pub register_index: u32,
    pub start_component: u32,
    pub num_components: u32,
    pub output_buffer: u32,
    pub dst_offset: u32,
}
