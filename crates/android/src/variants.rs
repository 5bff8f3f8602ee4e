//! Build / AndroidTest variant pairing
//!
//! Gradle exposes an instrumentation-test variant for an app variant by
//! appending [`TEST_SUFFIX`] to its name (`DemoDebug` -> `DemoDebugAndroidTest`).
//! Names are compared case-insensitively but returned with the casing Gradle
//! reported.

use crate::error::VariantError;
use indexmap::IndexMap;

/// Suffix Gradle appends to an app variant to name its instrumentation tests
pub const TEST_SUFFIX: &str = "AndroidTest";

/// Module name -> variant names, in the order Gradle listed them.
///
/// The root project uses the empty module name.
pub type Variants = IndexMap<String, Vec<String>>;

/// Case-insensitive equality used for every variant/artifact name comparison
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Case-insensitive suffix test
pub fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.to_lowercase().ends_with(&suffix.to_lowercase())
}

/// Whether `variant` names an instrumentation-test variant
pub fn is_test_variant(variant: &str) -> bool {
    ends_with_ignore_case(variant, TEST_SUFFIX)
}

/// Name of the AndroidTest variant belonging to `app_variant`
pub fn test_variant_name(app_variant: &str) -> String {
    format!("{}{}", app_variant, TEST_SUFFIX)
}

/// Returns the (build, AndroidTest) variant pairs per module.
///
/// Each module's value is the flattened pair list
/// `[app1, app1AndroidTest, app2, app2AndroidTest, ...]` in the order the app
/// variants were listed. Modules without any pair are left out. With
/// `module = None` every module is considered.
pub fn android_test_variant_pairs(module: Option<&str>, variants: &Variants) -> Variants {
    let mut pairs = Variants::new();

    for (name, module_variants) in variants {
        if module.is_some_and(|m| m != name) {
            continue;
        }

        let (tests, apps): (Vec<&String>, Vec<&String>) =
            module_variants.iter().partition(|v| is_test_variant(v));

        let module_pairs: Vec<String> = apps
            .into_iter()
            .filter_map(|app| {
                let wanted = test_variant_name(app);
                tests
                    .iter()
                    .find(|t| eq_ignore_case(t, &wanted))
                    .map(|test| [app.clone(), (*test).clone()])
            })
            .flatten()
            .collect();

        if !module_pairs.is_empty() {
            pairs.insert(name.clone(), module_pairs);
        }
    }

    pairs
}

/// Selects `variant` and its AndroidTest variant from `module`.
///
/// On success the result holds exactly one entry, `module -> [app, test]`,
/// using the casing found in `variants`.
pub fn filter_variants(
    module: &str,
    variant: &str,
    variants: &Variants,
) -> Result<Variants, VariantError> {
    let module_variants = variants.get(module).map(Vec::as_slice).unwrap_or_default();
    let wanted_test = test_variant_name(variant);

    let app_variant = module_variants
        .iter()
        .find(|v| eq_ignore_case(v, variant))
        .ok_or_else(|| VariantError::AppVariantNotFound {
            variant: variant.to_string(),
            module: module.to_string(),
        })?;

    let test_variant = module_variants
        .iter()
        .find(|v| eq_ignore_case(v, &wanted_test))
        .ok_or_else(|| VariantError::TestVariantNotFound {
            variant: wanted_test.clone(),
            module: module.to_string(),
        })?;

    let mut filtered = Variants::new();
    filtered.insert(
        module.to_string(),
        vec![app_variant.clone(), test_variant.clone()],
    );
    Ok(filtered)
}
