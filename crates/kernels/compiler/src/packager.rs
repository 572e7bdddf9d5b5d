//! Staging and linking of executable packages.
//!
//! Packaging runs in two steps. [`Packager::stage`] writes resolved code and
//! the default data image into an Intermediate package. [`Packager::link`]
//! lays the staged bytes out in the requested mode, allocates the final
//! blocks and tags every data element's metadata byte with its variable's
//! shape.

use serde::{Deserialize, Serialize};
use tracing::debug;
use vexel_foundation::{calls_external, tag_elements, ELEMENT_SIZE};
use vexel_package::{
    padded_metadata_size, AllocatorTag, Block, LanguageVersion, Layout, Package, PackageError,
    PackageFlags, PackageHeader, PackagingMode, SegmentKind, Sizes,
};

use crate::error::{CompileError, Result};
use crate::variables::SymbolTable;

/// Default stack capacity in elements.
pub const DEFAULT_STACK_ELEMENTS: usize = 16;

/// How a package is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageOptions {
    pub mode: PackagingMode,
    /// Stack capacity in elements; zero omits the stack.
    pub stack_elements: usize,
    pub allocator: AllocatorTag,
    pub language: LanguageVersion,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            mode: PackagingMode::Combined,
            stack_elements: DEFAULT_STACK_ELEMENTS,
            allocator: AllocatorTag::Heap,
            language: LanguageVersion::CURRENT,
        }
    }
}

impl PackageOptions {
    pub fn with_mode(mut self, mode: PackagingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stack(mut self, elements: usize) -> Self {
        self.stack_elements = elements;
        self
    }

    pub fn with_allocator(mut self, allocator: AllocatorTag) -> Self {
        self.allocator = allocator;
        self
    }
}

/// Builds packages from resolved code and a symbol table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Packager {
    options: PackageOptions,
}

impl Packager {
    pub fn new(options: PackageOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PackageOptions {
        &self.options
    }

    /// Write code and default data into an Intermediate package.
    pub fn stage(&self, code: &[u8], symbols: &SymbolTable) -> Result<Package> {
        let stack = self.options.stack_elements * ELEMENT_SIZE;
        let layout = Layout::intermediate(code.len(), symbols.data_size(), stack, symbols.len())?;
        let mut flags = PackageFlags::empty();
        flags.set(PackageFlags::STACK_OMITTED, stack == 0);
        flags.set(PackageFlags::EXTERNAL_CALLS, calls_external(code));

        let mut package = Package::allocate(layout, flags, self.options.allocator)?;
        let (code_bytes, data_bytes) = package.staging_mut()?;
        code_bytes.copy_from_slice(code);
        let image = symbols.data_image();
        data_bytes[..image.len()].copy_from_slice(&image);
        debug!(
            code = code.len(),
            data = symbols.data_size(),
            stack,
            variables = symbols.len(),
            "staged package"
        );
        Ok(package)
    }

    /// Lay a staged package out in the configured mode.
    pub fn link(&self, staged: &Package, symbols: &SymbolTable) -> Result<Package> {
        let (code, staging_data) = staged.staging()?;
        let [_, data_size, stack_size, _] = staged.layout().offsets().map(usize::from);
        let mode = self.options.mode;
        let elements = (data_size + stack_size) / ELEMENT_SIZE;
        let metadata = match mode {
            PackagingMode::Combined => padded_metadata_size(code.len(), elements),
            PackagingMode::Segmented => padded_metadata_size(0, elements),
            PackagingMode::Batched => elements,
            PackagingMode::Intermediate => {
                return Err(CompileError::Layout(PackageError::NotLinked(mode)))
            }
        };
        let sizes = Sizes {
            code: code.len(),
            metadata,
            data: data_size,
            stack: stack_size,
        };
        let layout = Layout::encode_sizes(mode, sizes)?;
        let mut package = self.allocate(layout, staged.flags())?;

        let segments = package.split_mut()?;
        let mut failed = None;
        segments.memory[..data_size].copy_from_slice(&staging_data[..data_size]);
        for symbol in symbols.iter() {
            let element = symbol.mapping.element();
            if !tag_elements(segments.metadata, element, symbol.variable.shape()) {
                failed = Some(element);
                break;
            }
        }
        if let Some(element) = failed {
            return Err(CompileError::Layout(PackageError::OutOfBounds {
                kind: SegmentKind::Metadata,
                offset: element,
                end: element + 1,
                len: metadata,
            }));
        }
        write_code(&mut package, code)?;

        debug!(
            %mode,
            code = sizes.code,
            metadata = sizes.metadata,
            data = sizes.data,
            stack = sizes.stack,
            "linked package"
        );
        Ok(package)
    }

    fn allocate(&self, layout: Layout, flags: PackageFlags) -> Result<Package> {
        let allocator = self.options.allocator;
        let header = PackageHeader {
            language: self.options.language,
            ..PackageHeader::new(layout, flags, allocator)
        };
        let (a, b) = layout.block_sizes()?;
        let data_block = match layout.mode() {
            PackagingMode::Combined => None,
            _ => Some(Block::zeroed(b, allocator)?),
        };
        Ok(Package::from_parts(header, Block::zeroed(a, allocator)?, data_block)?)
    }

    /// Stage and link in one step.
    pub fn package(&self, code: &[u8], symbols: &SymbolTable) -> Result<Package> {
        let staged = self.stage(code, symbols)?;
        self.link(&staged, symbols)
    }
}

fn write_code(package: &mut Package, code: &[u8]) -> Result<()> {
    let bytes = package.segment_mut(SegmentKind::Code)?;
    bytes.copy_from_slice(code);
    Ok(())
}
