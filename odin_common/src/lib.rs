/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */
#![allow(unused)]

pub mod macros;
pub mod datetime;
pub mod geo;
pub mod net;

/// the key for f64 values that should compare equal if they are within the precision of `decimals`
/// NaN values all map to the same key
#[inline]
pub fn quantize (x: f64, decimals: i32) -> i64 {
    if x.is_nan() { i64::MIN } else { (x * 10f64.powi(decimals)).round() as i64 }
}
