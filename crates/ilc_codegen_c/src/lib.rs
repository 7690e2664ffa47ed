mod emit;
mod naming;
mod packer;
mod translate;

pub use emit::{CEmitter, StaticInit, TypeUnit, STATIC_INIT_NAME};
pub use naming::{escape_identifier, NameTable, TypeShape};
pub use packer::{dump_units, pack, CompileUnit, PRELUDE, PRELUDE_NAME};
pub use translate::{BodyTranslator, DefaultTranslator, TranslateContext, TranslatedBody};

use ilc_mono::Resolver;

/// Emits every type instance of a processed resolver and packs the result into units.
pub fn generate(
  resolver: &Resolver,
  translator: &dyn BodyTranslator,
) -> Vec<CompileUnit> {
  let names = NameTable::build(resolver);
  let (types, init) = CEmitter::new(resolver, &names, translator).emit();
  pack(types, init, names.root(), resolver.config())
}
