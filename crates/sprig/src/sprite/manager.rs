//! Named, ordered sprite layers.
//!
//! Layers draw in insertion order; sprites within a layer draw in list order.
//! Sorting by z is explicit ([`SpriteManager::sort_layer`]) and never happens
//! during rendering, so a game that adds sprites back to front pays nothing.

use crate::render::Renderer;

use super::Sprite;

/// Name of the layer every manager starts with.
pub const BASE_LAYER: &str = "base";

#[derive(Debug, Clone)]
struct Layer {
    name: String,
    sprites: Vec<Sprite>,
}

#[derive(Debug, Clone)]
pub struct SpriteManager {
    layers: Vec<Layer>,
}

impl Default for SpriteManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SpriteManager {
    /// A manager with the single layer [`BASE_LAYER`].
    pub fn new() -> Self {
        Self {
            layers: vec![Layer {
                name: BASE_LAYER.to_owned(),
                sprites: Vec::new(),
            }],
        }
    }

    /// Append a layer, drawn after all existing ones. Names are unique;
    /// returns `false` if the name is taken.
    pub fn add_layer(&mut self, name: &str) -> bool {
        if self.position(name).is_some() {
            log::warn!("Layer {name:?} already exists");
            return false;
        }
        self.layers.push(Layer {
            name: name.to_owned(),
            sprites: Vec::new(),
        });
        true
    }

    /// Remove a layer and return its sprites. The base layer stays.
    pub fn remove_layer(&mut self, name: &str) -> Option<Vec<Sprite>> {
        if name == BASE_LAYER {
            log::warn!("The {BASE_LAYER:?} layer cannot be removed");
            return None;
        }
        let i = self.position(name)?;
        Some(self.layers.remove(i).sprites)
    }

    pub fn remove_layer_at(&mut self, index: usize) -> Option<Vec<Sprite>> {
        let name = self.layers.get(index)?.name.clone();
        self.remove_layer(&name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    fn layer_entry_mut(&mut self, name: &str) -> Option<&mut Layer> {
        let found = self.layers.iter_mut().find(|l| l.name == name);
        if found.is_none() {
            log::warn!("Unknown layer {name:?}");
        }
        found
    }

    pub fn layer(&self, name: &str) -> Option<&[Sprite]> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.sprites.as_slice())
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Vec<Sprite>> {
        self.layer_entry_mut(name).map(|l| &mut l.sprites)
    }

    pub fn layer_at(&self, index: usize) -> Option<&[Sprite]> {
        self.layers.get(index).map(|l| l.sprites.as_slice())
    }

    /// Layer names in draw order.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Append `sprite` to a layer. Returns the sprite back if the layer
    /// doesn't exist.
    pub fn add_sprite(&mut self, layer: &str, sprite: Sprite) -> Result<(), Sprite> {
        match self.layer_entry_mut(layer) {
            Some(l) => {
                l.sprites.push(sprite);
                Ok(())
            }
            None => Err(sprite),
        }
    }

    pub fn remove_sprite(&mut self, layer: &str, index: usize) -> Option<Sprite> {
        let l = self.layer_entry_mut(layer)?;
        (index < l.sprites.len()).then(|| l.sprites.remove(index))
    }

    /// Stable sort by z: equal z keeps insertion order.
    pub fn sort_layer(&mut self, name: &str) -> bool {
        match self.layer_entry_mut(name) {
            Some(l) => {
                l.sprites.sort_by_key(Sprite::z);
                true
            }
            None => false,
        }
    }

    /// Draw a layer's sprites in list order.
    pub fn render_layer(&self, renderer: &mut Renderer, name: &str) -> bool {
        let Some(sprites) = self.layer(name) else {
            log::warn!("Unknown layer {name:?}");
            return false;
        };
        for sprite in sprites {
            sprite.render(renderer);
        }
        true
    }

    /// Move and animate every sprite in a layer by `delta` seconds.
    pub fn update_layer(&mut self, name: &str, delta: f32) -> bool {
        match self.layer_entry_mut(name) {
            Some(l) => {
                l.sprites.iter_mut().for_each(|s| s.update(delta));
                true
            }
            None => false,
        }
    }

    /// Draw every layer in order.
    pub fn render_all(&self, renderer: &mut Renderer) {
        for sprite in self.layers.iter().flat_map(|l| &l.sprites) {
            sprite.render(renderer);
        }
    }

    pub fn update_all(&mut self, delta: f32) {
        for sprite in self.layers.iter_mut().flat_map(|l| &mut l.sprites) {
            sprite.update(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ImageHandle;

    fn sprite(z: i32, x: f32) -> Sprite {
        Sprite::new(ImageHandle(0), (8, 8), x, 0.0).with_z(z)
    }

    fn zs(m: &SpriteManager, layer: &str) -> Vec<i32> {
        m.layer(layer).unwrap().iter().map(Sprite::z).collect()
    }

    #[test]
    fn starts_with_base_layer() {
        let m = SpriteManager::new();
        assert_eq!(m.layer_names().collect::<Vec<_>>(), vec![BASE_LAYER]);
        assert!(m.layer(BASE_LAYER).unwrap().is_empty());
    }

    #[test]
    fn sort_orders_by_z() {
        let mut m = SpriteManager::new();
        for z in [3, 1, 2] {
            m.add_sprite(BASE_LAYER, sprite(z, 0.0)).unwrap();
        }
        assert!(m.sort_layer(BASE_LAYER));
        assert_eq!(zs(&m, BASE_LAYER), vec![1, 2, 3]);
    }

    #[test]
    fn sort_is_stable_for_equal_z() {
        let mut m = SpriteManager::new();
        m.add_sprite(BASE_LAYER, sprite(1, 10.0)).unwrap();
        m.add_sprite(BASE_LAYER, sprite(0, 99.0)).unwrap();
        m.add_sprite(BASE_LAYER, sprite(1, 20.0)).unwrap();
        m.add_sprite(BASE_LAYER, sprite(1, 30.0)).unwrap();
        m.sort_layer(BASE_LAYER);
        let xs: Vec<f32> = m.layer(BASE_LAYER).unwrap().iter().map(Sprite::x).collect();
        assert_eq!(xs, vec![99.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn layers_keep_insertion_order_and_unique_names() {
        let mut m = SpriteManager::new();
        assert!(m.add_layer("fg"));
        assert!(m.add_layer("ui"));
        assert!(!m.add_layer("fg"));
        assert_eq!(m.layer_names().collect::<Vec<_>>(), vec!["base", "fg", "ui"]);
        assert!(m.remove_layer("fg").is_some());
        assert!(m.remove_layer("fg").is_none());
        assert_eq!(m.layer_names().collect::<Vec<_>>(), vec!["base", "ui"]);
    }

    #[test]
    fn base_layer_cannot_be_removed() {
        let mut m = SpriteManager::new();
        assert!(m.remove_layer(BASE_LAYER).is_none());
        assert!(m.remove_layer_at(0).is_none());
        assert_eq!(m.layer_count(), 1);
    }

    #[test]
    fn unknown_layer_returns_the_sprite() {
        let mut m = SpriteManager::new();
        let back = m.add_sprite("nope", sprite(7, 0.0)).unwrap_err();
        assert_eq!(back.z(), 7);
        assert!(!m.sort_layer("nope"));
        assert!(!m.update_layer("nope", 1.0));
    }

    #[test]
    fn update_layer_moves_only_that_layer() {
        let mut m = SpriteManager::new();
        m.add_layer("moving");
        let mut s = sprite(0, 0.0);
        s.set_velocity(10.0, 0.0);
        m.add_sprite("moving", s.clone()).unwrap();
        m.add_sprite(BASE_LAYER, s).unwrap();
        m.update_layer("moving", 1.0);
        assert_eq!(m.layer("moving").unwrap()[0].x(), 10.0);
        assert_eq!(m.layer(BASE_LAYER).unwrap()[0].x(), 0.0);
        m.update_all(1.0);
        assert_eq!(m.layer("moving").unwrap()[0].x(), 20.0);
    }

    #[test]
    fn render_draws_in_list_order() {
        let mut r = Renderer::new();
        r.add_headless_context(100, 100);
        let img = r.create_image(8, 8).unwrap();
        let mut m = SpriteManager::new();
        m.add_layer("top");
        m.add_sprite("top", Sprite::new(img, (8, 8), 50.0, 0.0)).unwrap();
        m.add_sprite(BASE_LAYER, Sprite::new(img, (8, 8), 1.0, 0.0)).unwrap();
        m.add_sprite(BASE_LAYER, Sprite::new(img, (8, 8), 2.0, 0.0)).unwrap();

        assert!(m.render_layer(&mut r, BASE_LAYER));
        assert!(!m.render_layer(&mut r, "missing"));
        m.render_all(&mut r);
        let xs: Vec<f32> = r
            .pending()
            .vertices
            .chunks(4)
            .map(|quad| quad[0].position[0])
            .collect();
        assert_eq!(xs, vec![1.0, 2.0, 1.0, 2.0, 50.0]);
    }
}
