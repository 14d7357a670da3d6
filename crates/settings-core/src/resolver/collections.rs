//! Lists and maps stored as plain settings.
//!
//! A list under `prefix` is laid out as
//!
//! ```text
//! prefix.count=2
//! prefix.elems.1=first
//! prefix.elems.2=second
//! ```
//!
//! and a map as `prefix.count` plus `prefix.elems.<i>_key` /
//! `prefix.elems.<i>_val` pairs.  Indices start at 1.  Every element is an
//! ordinary setting, so the usual resolution, defaults and error reporting
//! apply to each of them.
//!
//! The count is read from storage and may be edited by hand, so readers stop
//! at the first missing element and report it instead of trusting the count.

use std::collections::BTreeMap;

use crate::domain::error::ErrorKind;
use crate::domain::value::SettingValue;
use crate::resolver::handle::DynSetting;
use crate::resolver::Resolver;

fn count_name(prefix: &str) -> String {
    format!("{prefix}.count")
}

fn elem_name(prefix: &str, index: usize) -> String {
    format!("{prefix}.elems.{index}")
}

fn report_missing(resolver: &Resolver, prefix: &str, count: usize, index: usize) {
    resolver.report(
        ErrorKind::BadSettingName,
        format!("{prefix} declares {count} elements but element {index} is missing"),
    );
}

/// Writes `items` under `prefix`.
///
/// Elements beyond the new count are left in storage; readers only look at
/// the first `count` of them.
pub fn write_list<T: SettingValue>(resolver: &Resolver, prefix: &str, items: &[T]) {
    DynSetting::new(resolver, &count_name(prefix)).set(&items.len());
    for (i, item) in items.iter().enumerate() {
        DynSetting::new(resolver, &elem_name(prefix, i + 1)).set(item);
    }
}

/// Reads the list stored under `prefix`.  A missing count reads as an empty
/// list; a count larger than the stored elements yields the elements up to
/// the first gap.
pub fn read_list<T: SettingValue + Default>(resolver: &Resolver, prefix: &str) -> Vec<T> {
    let count: usize = DynSetting::new(resolver, &count_name(prefix)).get();
    let mut items = Vec::new();
    for i in 1..=count {
        let elem = DynSetting::new(resolver, &elem_name(prefix, i));
        if !elem.exists() {
            report_missing(resolver, prefix, count, i);
            break;
        }
        items.push(elem.get());
    }
    items
}

/// Writes `map` under `prefix`, in key order.
pub fn write_map<K, V>(resolver: &Resolver, prefix: &str, map: &BTreeMap<K, V>)
where
    K: SettingValue,
    V: SettingValue,
{
    DynSetting::new(resolver, &count_name(prefix)).set(&map.len());
    for (i, (key, value)) in map.iter().enumerate() {
        let elem = elem_name(prefix, i + 1);
        DynSetting::new(resolver, &format!("{elem}_key")).set(key);
        DynSetting::new(resolver, &format!("{elem}_val")).set(value);
    }
}

/// Reads the map stored under `prefix`.  When a key occurs twice the later
/// entry wins.
pub fn read_map<K, V>(resolver: &Resolver, prefix: &str) -> BTreeMap<K, V>
where
    K: SettingValue + Default + Ord,
    V: SettingValue + Default,
{
    let count: usize = DynSetting::new(resolver, &count_name(prefix)).get();
    let mut map = BTreeMap::new();
    for i in 1..=count {
        let elem = elem_name(prefix, i);
        let key = DynSetting::new(resolver, &format!("{elem}_key"));
        if !key.exists() {
            report_missing(resolver, prefix, count, i);
            break;
        }
        let value = DynSetting::new(resolver, &format!("{elem}_val")).get();
        map.insert(key.get(), value);
    }
    map
}
